//! Virtual-key classification.
//!
//! The special-key table is the only way a key identity can leave the engine
//! without CTRL held. It lists non-printable keys exclusively; adding a
//! letter, digit, punctuation or space key here would leak typed text.

/// Non-printable keys whose names may be reported, ordered by virtual-key code.
const SPECIAL_KEYS: &[(u16, &str)] = &[
    (0x08, "Backspace"),
    (0x09, "Tab"),
    (0x0C, "Clear"),
    (0x0D, "Enter"),
    (0x10, "Shift"),
    (0x11, "Ctrl"),
    (0x12, "Alt"),
    (0x13, "Pause"),
    (0x14, "CapsLock"),
    (0x1B, "Escape"),
    (0x21, "PageUp"),
    (0x22, "PageDown"),
    (0x23, "End"),
    (0x24, "Home"),
    (0x25, "Left"),
    (0x26, "Up"),
    (0x27, "Right"),
    (0x28, "Down"),
    (0x2C, "PrintScreen"),
    (0x2D, "Insert"),
    (0x2E, "Delete"),
    (0x2F, "Help"),
    (0x5B, "LWin"),
    (0x5C, "RWin"),
    (0x5D, "Apps"),
    (0x70, "F1"),
    (0x71, "F2"),
    (0x72, "F3"),
    (0x73, "F4"),
    (0x74, "F5"),
    (0x75, "F6"),
    (0x76, "F7"),
    (0x77, "F8"),
    (0x78, "F9"),
    (0x79, "F10"),
    (0x7A, "F11"),
    (0x7B, "F12"),
    (0x7C, "F13"),
    (0x7D, "F14"),
    (0x7E, "F15"),
    (0x7F, "F16"),
    (0x80, "F17"),
    (0x81, "F18"),
    (0x82, "F19"),
    (0x83, "F20"),
    (0x84, "F21"),
    (0x85, "F22"),
    (0x86, "F23"),
    (0x87, "F24"),
    (0x90, "NumLock"),
    (0x91, "ScrollLock"),
    (0xA0, "LShift"),
    (0xA1, "RShift"),
    (0xA2, "LCtrl"),
    (0xA3, "RCtrl"),
    (0xA4, "LAlt"),
    (0xA5, "RAlt"),
];

/// Name of a special (non-printable) key, or `None` for everything else.
pub fn special_key_name(virtual_key: u16) -> Option<&'static str> {
    SPECIAL_KEYS
        .binary_search_by_key(&virtual_key, |&(code, _)| code)
        .ok()
        .map(|index| SPECIAL_KEYS[index].1)
}

pub fn is_special_key(virtual_key: u16) -> bool {
    special_key_name(virtual_key).is_some()
}

/// Label for a key pressed together with CTRL (a shortcut).
///
/// Letters and digits map to their character; anything else falls back to
/// the special-key name or a hex code.
pub fn shortcut_key_label(virtual_key: u16) -> String {
    match virtual_key {
        0x30..=0x39 | 0x41..=0x5A => char::from(virtual_key as u8).to_string(),
        _ => match special_key_name(virtual_key) {
            Some(name) => name.to_string(),
            None => format!("0x{virtual_key:02X}"),
        },
    }
}
