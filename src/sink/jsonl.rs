//! Append-only JSON-lines metrics file.

use super::{MetricsSink, SinkError};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use uuid::Uuid;

/// Records buffered ahead of the writer before new ones are dropped.
const CHANNEL_CAPACITY: usize = 10_000;

/// One line of the metrics file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricLine {
    pub timestamp: DateTime<Utc>,
    /// Identifies the engine run that produced the record
    pub instance: Uuid,
    pub name: String,
    pub fields: Map<String, Value>,
}

/// Sink that hands records to a background writer thread.
///
/// `record` never blocks; when the writer falls behind and the channel is
/// full the record is dropped and counted.
pub struct JsonlSink {
    sender: Option<Sender<MetricLine>>,
    writer: Option<JoinHandle<()>>,
    instance: Uuid,
    dropped: Arc<AtomicU64>,
}

impl JsonlSink {
    /// Open (or create) `path` for appending and start the writer.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let open_error = |source| SinkError::Open {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(open_error)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_error)?;

        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        let writer = thread::Builder::new()
            .name("metrics-writer".into())
            .spawn(move || write_lines(receiver, BufWriter::new(file)))
            .map_err(SinkError::Spawn)?;

        let instance = Uuid::new_v4();
        tracing::info!(%instance, path = %path.display(), "writing metrics");
        Ok(Self {
            sender: Some(sender),
            writer: Some(writer),
            instance,
            dropped: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    /// Records discarded because the writer could not keep up.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Flush everything queued and stop the writer.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.sender.take();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                tracing::warn!("metrics writer panicked");
            }
        }
    }
}

impl MetricsSink for JsonlSink {
    fn record(&self, name: &str, fields: Map<String, Value>) {
        let Some(sender) = &self.sender else {
            return;
        };
        let line = MetricLine {
            timestamp: Utc::now(),
            instance: self.instance,
            name: name.to_string(),
            fields,
        };
        match sender.try_send(line) {
            Ok(()) => {}
            Err(TrySendError::Full(line)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(name = %line.name, "metrics channel full; dropping record");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("metrics writer stopped; dropping record");
            }
        }
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn write_lines<W: Write>(receiver: Receiver<MetricLine>, mut out: W) {
    for line in receiver.iter() {
        let written = serde_json::to_writer(&mut out, &line)
            .map_err(std::io::Error::from)
            .and_then(|()| out.write_all(b"\n"));
        if let Err(e) = written {
            tracing::warn!(error = %e, "failed to write metric record");
        }
        if receiver.is_empty() {
            if let Err(e) = out.flush() {
                tracing::warn!(error = %e, "failed to flush metrics file");
            }
        }
    }
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_are_appended_as_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics").join("records.jsonl");

        let sink = JsonlSink::create(&path).unwrap();
        let instance = sink.instance();
        let mut fields = Map::new();
        fields.insert("sleep".into(), json!(true));
        sink.record("user-inactive", fields);
        sink.record("power-suspend", Map::new());
        sink.close();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<MetricLine> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "user-inactive");
        assert_eq!(lines[0].fields.get("sleep"), Some(&json!(true)));
        assert_eq!(lines[1].name, "power-suspend");
        assert!(lines.iter().all(|l| l.instance == instance));
    }

    #[test]
    fn test_reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");

        for _ in 0..2 {
            let sink = JsonlSink::create(&path).unwrap();
            sink.record("user-active", Map::new());
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
