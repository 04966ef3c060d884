//! Privacy-preserving transparency log.
//!
//! Counts what the engine observed and what it reported, so users can audit
//! collection. Only counts are kept: no record contents, no key identities.

use crate::collector::types::InputSample;
use crate::core::metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Broad grouping of emitted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCategory {
    /// Launch, focus and close records
    Application,
    /// Typing, pointer and activity records
    Input,
    /// Power and configuration records
    System,
}

impl RecordCategory {
    pub fn of(name: &str) -> Self {
        match name {
            metrics::APP_LAUNCH | metrics::APP_ACTIVE | metrics::APP_INACTIVE | metrics::APP_CLOSE => {
                RecordCategory::Application
            }
            metrics::KEY_TIME
            | metrics::TYPING_SESSION
            | metrics::MOUSE
            | metrics::USER_ACTIVE
            | metrics::USER_INACTIVE => RecordCategory::Input,
            _ => RecordCategory::System,
        }
    }
}

#[derive(Debug)]
pub struct TransparencyLog {
    keyboard_samples: AtomicU64,
    pointer_samples: AtomicU64,
    /// Raw input packets that could not be decoded
    decode_failures: AtomicU64,
    application_records: AtomicU64,
    input_records: AtomicU64,
    system_records: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            keyboard_samples: AtomicU64::new(0),
            pointer_samples: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            application_records: AtomicU64::new(0),
            input_records: AtomicU64::new(0),
            system_records: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that loads from and saves to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!(error = %e, "could not load previous transparency stats");
        }

        log
    }

    /// Count a decoded input sample.
    pub fn record_sample(&self, sample: &InputSample) {
        let counter = match sample {
            InputSample::Keyboard(_) => &self.keyboard_samples,
            InputSample::Pointer(_) => &self.pointer_samples,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an emitted record by its event name.
    pub fn record_metric(&self, name: &str) {
        let counter = match RecordCategory::of(name) {
            RecordCategory::Application => &self.application_records,
            RecordCategory::Input => &self.input_records,
            RecordCategory::System => &self.system_records,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            keyboard_samples: self.keyboard_samples.load(Ordering::Relaxed),
            pointer_samples: self.pointer_samples.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            application_records: self.application_records.load(Ordering::Relaxed),
            input_records: self.input_records.load(Ordering::Relaxed),
            system_records: self.system_records.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Keyboard samples decoded: {}\n\
             - Pointer samples decoded: {}\n\
             - Undecodable packets dropped: {}\n\
             - Application records: {}\n\
             - Input records: {}\n\
             - System records: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - No typed characters reported (shortcuts only with CTRL)\n\
             - No cursor coordinates reported\n\
             - Executable paths reported relative to system folders",
            stats.keyboard_samples,
            stats.pointer_samples,
            stats.decode_failures,
            stats.application_records,
            stats.input_records,
            stats.system_records,
            stats.session_duration_secs
        )
    }

    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                keyboard_samples: stats.keyboard_samples,
                pointer_samples: stats.pointer_samples,
                decode_failures: stats.decode_failures,
                application_records: stats.application_records,
                input_records: stats.input_records,
                system_records: stats.system_records,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.keyboard_samples
                    .store(persisted.keyboard_samples, Ordering::Relaxed);
                self.pointer_samples
                    .store(persisted.pointer_samples, Ordering::Relaxed);
                self.decode_failures
                    .store(persisted.decode_failures, Ordering::Relaxed);
                self.application_records
                    .store(persisted.application_records, Ordering::Relaxed);
                self.input_records
                    .store(persisted.input_records, Ordering::Relaxed);
                self.system_records
                    .store(persisted.system_records, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    pub fn reset(&self) {
        for counter in [
            &self.keyboard_samples,
            &self.pointer_samples,
            &self.decode_failures,
            &self.application_records,
            &self.input_records,
            &self.system_records,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub keyboard_samples: u64,
    pub pointer_samples: u64,
    pub decode_failures: u64,
    pub application_records: u64,
    pub input_records: u64,
    pub system_records: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    keyboard_samples: u64,
    pointer_samples: u64,
    decode_failures: u64,
    application_records: u64,
    input_records: u64,
    system_records: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{KeyboardSample, PointerSample};

    #[test]
    fn test_sample_counting() {
        let log = TransparencyLog::new();
        let key = InputSample::Keyboard(KeyboardSample {
            virtual_key: 0x41,
            is_key_up: true,
            device_is_synthetic: false,
            timestamp: 0,
        });

        log.record_sample(&key);
        log.record_sample(&key);
        log.record_sample(&InputSample::Pointer(PointerSample::movement(1, 1)));
        log.record_decode_failure();

        let stats = log.stats();
        assert_eq!(stats.keyboard_samples, 2);
        assert_eq!(stats.pointer_samples, 1);
        assert_eq!(stats.decode_failures, 1);
    }

    #[test]
    fn test_records_are_categorized() {
        let log = TransparencyLog::new();
        log.record_metric(metrics::APP_LAUNCH);
        log.record_metric(metrics::TYPING_SESSION);
        log.record_metric(metrics::MOUSE);
        log.record_metric(metrics::CONFIG_RESOLUTION);

        let stats = log.stats();
        assert_eq!(stats.application_records, 1);
        assert_eq!(stats.input_records, 2);
        assert_eq!(stats.system_records, 1);

        log.reset();
        assert_eq!(log.stats().input_records, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transparency.json");

        let log = TransparencyLog::with_persistence(path.clone());
        log.record_metric(metrics::APP_CLOSE);
        log.record_decode_failure();
        log.save().unwrap();

        let reloaded = TransparencyLog::with_persistence(path);
        let stats = reloaded.stats();
        assert_eq!(stats.application_records, 1);
        assert_eq!(stats.decode_failures, 1);
    }

    #[test]
    fn test_summary_format() {
        let summary = TransparencyLog::new().summary();
        assert!(summary.contains("Keyboard samples"));
        assert!(summary.contains("Privacy Guarantee"));
        assert!(summary.contains("No typed characters"));
    }
}
