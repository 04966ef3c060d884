//! Destinations for finished metric records.
//!
//! The engine hands every record to a [`MetricsSink`] and never waits on
//! the result. Uploading, batching and schemas beyond name + fields belong
//! to whatever sits behind the sink.

pub mod jsonl;

pub use jsonl::{JsonlSink, MetricLine};

use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Fire-and-forget record consumer.
pub trait MetricsSink {
    fn record(&self, name: &str, fields: Map<String, Value>);
}

impl<S: MetricsSink + ?Sized> MetricsSink for Arc<S> {
    fn record(&self, name: &str, fields: Map<String, Value>) {
        (**self).record(name, fields)
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to open metrics file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn metrics writer: {0}")]
    Spawn(#[source] std::io::Error),
}

/// A record as received by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMetric {
    pub name: String,
    pub fields: Map<String, Value>,
}

/// Keeps every record in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<RecordedMetric>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RecordedMetric> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Names of all records so far, in order.
    pub fn names(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.name).collect()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<RecordedMetric> {
        self.records
            .lock()
            .map(|mut records| std::mem::take(&mut *records))
            .unwrap_or_default()
    }
}

impl MetricsSink for MemorySink {
    fn record(&self, name: &str, fields: Map<String, Value>) {
        if let Ok(mut records) = self.records.lock() {
            records.push(RecordedMetric {
                name: name.to_string(),
                fields,
            });
        }
    }
}
