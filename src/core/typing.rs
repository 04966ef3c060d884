//! Typing-session detection.
//!
//! Key releases are grouped into sessions separated by pauses longer than
//! [`SESSION_TIMEOUT_MS`]. Only counts and timing leave this module: the
//! identity of a printable key is never reported unless CTRL is held.

use crate::collector::keys::{is_special_key, shortcut_key_label, special_key_name};
use crate::collector::types::KeyboardSample;
use crate::core::metrics::{KeyTime, Metric, TypingSession};
use crate::platform::ModifierKeyQuery;

/// A gap longer than this between two keys ends the session.
pub const SESSION_TIMEOUT_MS: i64 = 60_000;
/// Sessions must last strictly longer than this to be reported.
pub const MIN_SESSION_DURATION_MS: u32 = 30_000;
/// Sessions need at least this many non-special keys to be reported.
pub const MIN_SESSION_KEYS: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypingSessionState {
    pub last_key_time: Option<u32>,
    pub session_start: Option<u32>,
    pub key_count: u32,
    pub special_key_count: u32,
}

impl TypingSessionState {
    pub fn session_open(&self) -> bool {
        self.key_count > 0
    }
}

/// Normalize the gap between two keys.
///
/// Negative gaps come from the 32-bit message clock wrapping; both they and
/// gaps above the timeout collapse to zero. A zero gap ends the session.
pub fn normalize_key_time(gap: i64) -> u32 {
    if (0..=SESSION_TIMEOUT_MS).contains(&gap) {
        gap as u32
    } else {
        0
    }
}

#[derive(Debug, Default)]
pub struct TypingSessionAggregator {
    state: TypingSessionState,
}

impl TypingSessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TypingSessionState {
        self.state
    }

    /// Process one keyboard sample.
    ///
    /// Key presses and injected input are ignored. Every counted release
    /// yields a `key-time` record, preceded by a `typing-session` record when
    /// the release closes a session long enough to report.
    pub fn process(
        &mut self,
        sample: &KeyboardSample,
        modifiers: &dyn ModifierKeyQuery,
    ) -> Vec<Metric> {
        if !sample.is_key_up || sample.device_is_synthetic {
            return Vec::new();
        }

        let mut records = Vec::with_capacity(2);
        let timestamp = sample.timestamp;

        let key_time = match self.state.last_key_time {
            Some(last) => normalize_key_time(i64::from(timestamp) - i64::from(last)),
            None => 0,
        };

        if self.state.session_open() && key_time == 0 {
            if let Some(session) = self.close_session() {
                records.push(Metric::TypingSession(session));
            }
        }

        let special = is_special_key(sample.virtual_key);
        if !self.state.session_open() {
            if !special {
                self.state.key_count = 1;
                self.state.session_start = Some(timestamp);
            }
        } else if special {
            self.state.special_key_count += 1;
        } else {
            self.state.key_count += 1;
        }
        self.state.last_key_time = Some(timestamp);

        let held = modifiers.held_modifiers();
        let key = if held.ctrl {
            Some(shortcut_key_label(sample.virtual_key))
        } else {
            special_key_name(sample.virtual_key).map(str::to_string)
        };
        records.push(Metric::KeyTime(KeyTime {
            key_time,
            modifier_keys: held.non_empty(),
            key,
        }));

        records
    }

    /// Close the open session, returning it if it qualifies for reporting.
    fn close_session(&mut self) -> Option<TypingSession> {
        let last_key_time = self.state.last_key_time;
        let state = std::mem::replace(
            &mut self.state,
            TypingSessionState {
                last_key_time,
                ..TypingSessionState::default()
            },
        );

        let start = state.session_start?;
        let last = state.last_key_time?;
        let duration = last.saturating_sub(start);
        if duration <= MIN_SESSION_DURATION_MS || state.key_count < MIN_SESSION_KEYS {
            tracing::debug!(duration, count = state.key_count, "discarding short typing session");
            return None;
        }

        let rate = (60_000.0 * f64::from(state.key_count) / f64::from(duration)).round() as u32;
        Some(TypingSession {
            duration,
            count: state.key_count,
            corrections: state.special_key_count,
            rate,
        })
    }
}
