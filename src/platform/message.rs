//! Translation of native window messages into typed engine events.

use crate::platform::{RawInputHandle, WindowHandle};

pub const WM_SETTINGCHANGE: u32 = 0x001A;
pub const WM_DISPLAYCHANGE: u32 = 0x007E;
pub const WM_INPUT: u32 = 0x00FF;
pub const WM_POWERBROADCAST: u32 = 0x0218;

pub const HSHELL_WINDOWCREATED: u64 = 1;
pub const HSHELL_WINDOWDESTROYED: u64 = 2;
pub const HSHELL_WINDOWACTIVATED: u64 = 4;
pub const HSHELL_RUDEAPPACTIVATED: u64 = 0x8004;

pub const PBT_APMSUSPEND: u64 = 0x0004;
pub const PBT_APMRESUMESUSPEND: u64 = 0x0007;
pub const PBT_APMRESUMEAUTOMATIC: u64 = 0x0012;

/// A window message as delivered by the native message pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeMessage {
    pub message: u32,
    pub wparam: u64,
    pub lparam: i64,
    /// 32-bit message time in milliseconds
    pub time: u32,
}

/// Typed notification consumed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    RawInput { handle: RawInputHandle, time: u32 },
    WindowCreated(WindowHandle),
    WindowDestroyed(WindowHandle),
    /// `None` means "whatever is in the foreground now".
    WindowActivated(Option<WindowHandle>),
    PowerSuspend,
    PowerResume,
    /// `action` is the SPI_* code; `area` names the changed policy section.
    SettingChange { action: u32, area: Option<String> },
    DisplayChange { width: u32, height: u32, bpp: Option<u32> },
}

impl NativeMessage {
    /// Translate into an engine event.
    ///
    /// `shell_hook_message` is the id registered for "SHELLHOOK" at runtime.
    /// Unknown messages and shell codes are ignored. The area string of a
    /// setting change lives behind a pointer, so it is left for the caller.
    pub fn translate(&self, shell_hook_message: u32) -> Option<NativeEvent> {
        match self.message {
            WM_INPUT => Some(NativeEvent::RawInput {
                handle: RawInputHandle(self.lparam as u64),
                time: self.time,
            }),
            WM_POWERBROADCAST => match self.wparam {
                PBT_APMSUSPEND => Some(NativeEvent::PowerSuspend),
                PBT_APMRESUMESUSPEND | PBT_APMRESUMEAUTOMATIC => Some(NativeEvent::PowerResume),
                _ => None,
            },
            WM_SETTINGCHANGE => Some(NativeEvent::SettingChange {
                action: self.wparam as u32,
                area: None,
            }),
            WM_DISPLAYCHANGE => {
                let packed = self.lparam as u64;
                Some(NativeEvent::DisplayChange {
                    width: (packed & 0xFFFF) as u32,
                    height: ((packed >> 16) & 0xFFFF) as u32,
                    bpp: match self.wparam {
                        0 => None,
                        bpp => Some(bpp as u32),
                    },
                })
            }
            message if message == shell_hook_message && message != 0 => self.translate_shell(),
            _ => None,
        }
    }

    fn translate_shell(&self) -> Option<NativeEvent> {
        let window = match self.lparam {
            0 => None,
            handle => Some(WindowHandle(handle as u64)),
        };
        match self.wparam {
            HSHELL_WINDOWCREATED => window.map(NativeEvent::WindowCreated),
            HSHELL_WINDOWDESTROYED => window.map(NativeEvent::WindowDestroyed),
            HSHELL_WINDOWACTIVATED | HSHELL_RUDEAPPACTIVATED => {
                Some(NativeEvent::WindowActivated(window))
            }
            _ => None,
        }
    }
}
