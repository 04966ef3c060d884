//! Decoded input sample types.
//!
//! Samples carry virtual key codes and relative deltas only while they are
//! inside the engine. Aggregators reduce them to timing, counts and distances
//! before anything reaches a metrics sink.

use serde::{Serialize, Serializer};

/// Raw-input button flag: left button pressed.
pub const RI_MOUSE_LEFT_BUTTON_DOWN: u16 = 0x0001;
/// Raw-input button flag: left button released.
pub const RI_MOUSE_LEFT_BUTTON_UP: u16 = 0x0002;
/// Raw-input button flag: right button pressed.
pub const RI_MOUSE_RIGHT_BUTTON_DOWN: u16 = 0x0004;
/// Raw-input button flag: right button released.
pub const RI_MOUSE_RIGHT_BUTTON_UP: u16 = 0x0008;
/// Raw-input button flag: vertical wheel moved.
pub const RI_MOUSE_WHEEL: u16 = 0x0400;
/// Raw-input button flag: horizontal wheel moved.
pub const RI_MOUSE_HWHEEL: u16 = 0x0800;

/// A decoded keyboard packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardSample {
    /// Windows virtual-key code
    pub virtual_key: u16,
    /// True for a key release (break code)
    pub is_key_up: bool,
    /// Device handle was 0: the input was injected, not typed
    pub device_is_synthetic: bool,
    /// 32-bit message time in milliseconds. Wraps after ~49.7 days.
    pub timestamp: u32,
}

/// A decoded pointer packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerSample {
    pub delta_x: i32,
    pub delta_y: i32,
    /// `RI_MOUSE_*` button transition flags
    pub button_flags: u16,
    /// Sign-extended wheel delta. Only meaningful with a wheel flag set.
    pub wheel_delta: i16,
    /// Device handle was 0: the input was injected
    pub device_is_synthetic: bool,
}

impl PointerSample {
    /// Create a movement-only sample from a real device.
    pub fn movement(delta_x: i32, delta_y: i32) -> Self {
        Self {
            delta_x,
            delta_y,
            button_flags: 0,
            wheel_delta: 0,
            device_is_synthetic: false,
        }
    }

    /// Create a button-transition sample with no movement.
    pub fn buttons(button_flags: u16) -> Self {
        Self {
            button_flags,
            ..Self::movement(0, 0)
        }
    }

    /// Create a vertical wheel sample with no movement.
    pub fn wheel(wheel_delta: i16) -> Self {
        Self {
            button_flags: RI_MOUSE_WHEEL,
            wheel_delta,
            ..Self::movement(0, 0)
        }
    }

    pub fn left_released(&self) -> bool {
        self.button_flags & RI_MOUSE_LEFT_BUTTON_UP != 0
    }

    pub fn right_released(&self) -> bool {
        self.button_flags & RI_MOUSE_RIGHT_BUTTON_UP != 0
    }

    /// Direction of vertical wheel motion: +1 away from the user, -1 toward.
    ///
    /// Only the sign is reported, never the magnitude.
    pub fn wheel_direction(&self) -> Option<i8> {
        if self.button_flags & RI_MOUSE_WHEEL == 0 {
            return None;
        }
        match self.wheel_delta.signum() {
            0 => None,
            s => Some(s as i8),
        }
    }
}

/// Tagged union produced by the raw-input decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSample {
    Keyboard(KeyboardSample),
    Pointer(PointerSample),
}

impl InputSample {
    pub fn is_synthetic(&self) -> bool {
        match self {
            InputSample::Keyboard(k) => k.device_is_synthetic,
            InputSample::Pointer(p) => p.device_is_synthetic,
        }
    }
}

/// Subset of SHIFT/CTRL/ALT held while a sample was processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierKeys {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl ModifierKeys {
    pub const NONE: ModifierKeys = ModifierKeys {
        shift: false,
        ctrl: false,
        alt: false,
    };

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.shift || self.ctrl || self.alt)
    }

    /// Names of the held modifiers in a fixed order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(3);
        if self.shift {
            names.push("shift");
        }
        if self.ctrl {
            names.push("ctrl");
        }
        if self.alt {
            names.push("alt");
        }
        names
    }

    /// `None` when nothing is held, so records can skip the field.
    pub fn non_empty(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl Serialize for ModifierKeys {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names())
    }
}
