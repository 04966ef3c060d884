//! Metric records produced by the engine.
//!
//! Each record is an event name plus a flat set of fields. Paths inside
//! records are always genericized and key identities are limited to the
//! special-key allow-list (or CTRL shortcuts).

use crate::collector::types::ModifierKeys;
use serde::Serialize;
use serde_json::{json, Map, Value};

pub const APP_LAUNCH: &str = "app-launch";
pub const APP_ACTIVE: &str = "app-active";
pub const APP_INACTIVE: &str = "app-inactive";
pub const APP_CLOSE: &str = "app-close";
pub const KEY_TIME: &str = "key-time";
pub const TYPING_SESSION: &str = "typing-session";
pub const MOUSE: &str = "mouse";
pub const USER_ACTIVE: &str = "user-active";
pub const USER_INACTIVE: &str = "user-inactive";
pub const POWER_SUSPEND: &str = "power-suspend";
pub const POWER_RESUME: &str = "power-resume";
pub const CONFIG: &str = "config";
pub const CONFIG_SPI: &str = "config.spi";
pub const CONFIG_RESOLUTION: &str = "config.resolution";
pub const INPUT_DISABLED: &str = "input-disabled";

/// Application lifecycle fields (`app-launch`, `app-close`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppLifecycle {
    pub exe: String,
    pub pid: u32,
    pub window_class: String,
}

/// Focus transition fields (`app-active`, `app-inactive`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppFocus {
    pub exe: String,
    /// Compact `<pid>:<handle hex>` identifier
    pub window: String,
    pub window_class: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyTime {
    pub key_time: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifier_keys: Option<ModifierKeys>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypingSession {
    /// Milliseconds between the first and last key of the session
    pub duration: u32,
    pub count: u32,
    /// Special (non-printable) keys seen while the session was open
    pub corrections: u32,
    /// Keys per minute
    pub rate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseRecord {
    /// 1 = left, 2 = right
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<u8>,
    /// +1 / -1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wheel: Option<i8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifier_keys: Option<ModifierKeys>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpp: Option<u32>,
}

/// A finished metric record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metric {
    AppLaunch(AppLifecycle),
    AppActive(AppFocus),
    AppInactive(AppFocus),
    AppClose(AppLifecycle),
    KeyTime(KeyTime),
    TypingSession(TypingSession),
    Mouse(MouseRecord),
    UserActive,
    UserInactive { sleep: bool },
    PowerSuspend,
    PowerResume,
    Config { area: String },
    ConfigSpi { action: u32 },
    ConfigResolution(Resolution),
    InputDisabled { reason: String },
}

impl Metric {
    /// Event name under which the record is emitted.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::AppLaunch(_) => APP_LAUNCH,
            Metric::AppActive(_) => APP_ACTIVE,
            Metric::AppInactive(_) => APP_INACTIVE,
            Metric::AppClose(_) => APP_CLOSE,
            Metric::KeyTime(_) => KEY_TIME,
            Metric::TypingSession(_) => TYPING_SESSION,
            Metric::Mouse(_) => MOUSE,
            Metric::UserActive => USER_ACTIVE,
            Metric::UserInactive { .. } => USER_INACTIVE,
            Metric::PowerSuspend => POWER_SUSPEND,
            Metric::PowerResume => POWER_RESUME,
            Metric::Config { .. } => CONFIG,
            Metric::ConfigSpi { .. } => CONFIG_SPI,
            Metric::ConfigResolution(_) => CONFIG_RESOLUTION,
            Metric::InputDisabled { .. } => INPUT_DISABLED,
        }
    }

    /// Record fields as a JSON object.
    pub fn fields(&self) -> Map<String, Value> {
        let value = match self {
            Metric::AppLaunch(f) | Metric::AppClose(f) => to_value(f),
            Metric::AppActive(f) | Metric::AppInactive(f) => to_value(f),
            Metric::KeyTime(f) => to_value(f),
            Metric::TypingSession(f) => to_value(f),
            Metric::Mouse(f) => to_value(f),
            Metric::ConfigResolution(f) => to_value(f),
            Metric::UserActive | Metric::PowerSuspend | Metric::PowerResume => json!({}),
            Metric::UserInactive { sleep } => json!({ "sleep": sleep }),
            Metric::Config { area } => json!({ "area": area }),
            Metric::ConfigSpi { action } => json!({ "action": action }),
            Metric::InputDisabled { reason } => json!({ "reason": reason }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

fn to_value<T: Serialize>(payload: &T) -> Value {
    // Payloads are plain structs of strings and integers.
    serde_json::to_value(payload).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_fields_are_camel_case() {
        let metric = Metric::AppActive(AppFocus {
            exe: r"%ProgramFiles%\Editor\editor.exe".into(),
            window: "42:1a2b".into(),
            window_class: "EditorWindow".into(),
        });
        assert_eq!(metric.name(), "app-active");
        assert_eq!(
            Value::Object(metric.fields()),
            json!({
                "exe": r"%ProgramFiles%\Editor\editor.exe",
                "window": "42:1a2b",
                "windowClass": "EditorWindow",
            })
        );
    }

    #[test]
    fn test_optional_fields_are_skipped() {
        let metric = Metric::KeyTime(KeyTime {
            key_time: 120,
            modifier_keys: None,
            key: None,
        });
        assert_eq!(Value::Object(metric.fields()), json!({ "keyTime": 120 }));

        let metric = Metric::Mouse(MouseRecord {
            button: None,
            wheel: Some(-1),
            distance: None,
            modifier_keys: Some(ModifierKeys::ctrl()),
        });
        assert_eq!(
            Value::Object(metric.fields()),
            json!({ "wheel": -1, "modifierKeys": ["ctrl"] })
        );
    }

    #[test]
    fn test_unit_metrics() {
        assert!(Metric::PowerSuspend.fields().is_empty());
        assert_eq!(
            Value::Object(Metric::UserInactive { sleep: true }.fields()),
            json!({ "sleep": true })
        );
        assert_eq!(Metric::ConfigSpi { action: 0x2F }.name(), "config.spi");
    }
}
