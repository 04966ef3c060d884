//! The telemetry engine.
//!
//! Owns every aggregator and routes native events to them. All state has a
//! single writer: the thread that calls [`TelemetryEngine::dispatch`] and
//! [`TelemetryEngine::run_due`]. Shell and setting notifications are not
//! handled inline; they are posted to the engine's own run queue so the
//! notification returns quickly.

pub mod runtime;
pub mod scheduler;

pub use runtime::Runtime;
pub use scheduler::{Clock, ManualClock, Scheduler, SystemClock, TaskId};

use crate::collector::decoder::{RawInputDecoder, RawInputQuery};
use crate::collector::types::InputSample;
use crate::config::{Config, SourceConfig};
use crate::core::inactivity::{InactivityMonitor, INACTIVITY_TIMEOUT};
use crate::core::metrics::{Metric, Resolution};
use crate::core::paths::PathGenericizer;
use crate::core::pointer::PointerMotionAggregator;
use crate::core::tracker::{PendingClose, TrackerSettings, WindowActivityTracker};
use crate::core::typing::TypingSessionAggregator;
use crate::platform::{
    ModifierKeyQuery, NativeEvent, NativeEventSource, RawInputHandle, SourceError, WindowQuery,
};
use crate::sink::MetricsSink;
use crate::transparency::{create_shared_log, SharedTransparencyLog};
use std::time::Duration;

/// Work queued on the engine's run queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// A shell or setting notification handled after the callback returns
    Deferred(NativeEvent),
    InactivityTimeout,
    ConfirmClose(PendingClose),
}

/// Reason reported when configuration turns input metrics off.
pub const INPUT_DISABLED_BY_CONFIG: &str = "config";

/// The engine's view of the outside world.
pub struct Collaborators {
    pub source: Box<dyn NativeEventSource>,
    pub windows: Box<dyn WindowQuery>,
    pub raw_input: Box<dyn RawInputQuery>,
    pub modifiers: Box<dyn ModifierKeyQuery>,
    pub sink: Box<dyn MetricsSink>,
    pub clock: Box<dyn Clock>,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub sources: SourceConfig,
    pub input_metrics: bool,
    pub inactivity_timeout: Duration,
    pub tracker: TrackerSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sources: SourceConfig::default(),
            input_metrics: true,
            inactivity_timeout: INACTIVITY_TIMEOUT,
            tracker: TrackerSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sources: config.sources,
            input_metrics: config.input_metrics,
            inactivity_timeout: config.inactivity_timeout,
            tracker: TrackerSettings {
                close_poll_interval: config.close_poll_interval,
                close_timeout: config.close_timeout,
                ..TrackerSettings::default()
            },
        }
    }
}

pub struct TelemetryEngine {
    io: Collaborators,
    settings: EngineSettings,
    decoder: RawInputDecoder,
    typing: TypingSessionAggregator,
    pointer: PointerMotionAggregator,
    inactivity: InactivityMonitor,
    tracker: WindowActivityTracker,
    timers: Scheduler<Task>,
    transparency: SharedTransparencyLog,
    window_messages: bool,
    raw_input: bool,
    input_disabled_reported: bool,
    suspended: bool,
}

impl TelemetryEngine {
    /// Build an engine that genericizes paths against the process
    /// environment.
    pub fn new(settings: EngineSettings, io: Collaborators) -> Self {
        Self::with_genericizer(settings, io, PathGenericizer::from_process_env())
    }

    pub fn with_genericizer(
        settings: EngineSettings,
        io: Collaborators,
        genericizer: PathGenericizer,
    ) -> Self {
        Self {
            io,
            settings,
            decoder: RawInputDecoder::default(),
            typing: TypingSessionAggregator::new(),
            pointer: PointerMotionAggregator::new(),
            inactivity: InactivityMonitor::new(settings.inactivity_timeout),
            tracker: WindowActivityTracker::new(genericizer, settings.tracker),
            timers: Scheduler::new(),
            transparency: create_shared_log(),
            window_messages: false,
            raw_input: false,
            input_disabled_reported: false,
            suspended: false,
        }
    }

    /// Count samples and records in `log` instead of a private one.
    pub fn with_transparency_log(mut self, log: SharedTransparencyLog) -> Self {
        self.transparency = log;
        self
    }

    pub fn transparency(&self) -> &SharedTransparencyLog {
        &self.transparency
    }

    pub fn tracker(&self) -> &WindowActivityTracker {
        &self.tracker
    }

    pub fn is_inactive(&self) -> bool {
        self.inactivity.is_inactive()
    }

    /// Whether a window of this process has focus.
    pub fn is_foreground(&self) -> bool {
        self.tracker.is_own_window_focused()
    }

    pub fn is_running(&self) -> bool {
        self.window_messages || self.raw_input
    }

    /// Subscribe to native notifications. Calling it again is a no-op.
    pub fn start(&mut self) -> Result<(), SourceError> {
        if !self.window_messages {
            self.io.source.subscribe_window_messages()?;
            self.window_messages = true;
            tracing::info!("subscribed to window messages");
            // Report whatever already has focus.
            let now = self.now();
            self.timers
                .post(now, Task::Deferred(NativeEvent::WindowActivated(None)));
        }

        if !self.settings.input_metrics {
            if !self.input_disabled_reported {
                self.input_disabled_reported = true;
                tracing::info!("input metrics disabled by configuration");
                self.emit(Metric::InputDisabled {
                    reason: INPUT_DISABLED_BY_CONFIG.to_string(),
                });
            }
        } else if !self.raw_input {
            self.io.source.subscribe_raw_input()?;
            self.raw_input = true;
            tracing::info!(
                keyboard = self.settings.sources.keyboard,
                mouse = self.settings.sources.mouse,
                "subscribed to raw input"
            );
            let now = self.now();
            self.inactivity.start(&mut self.timers, now);
        }
        Ok(())
    }

    /// Drop native subscriptions and cancel the inactivity timer. Calling it
    /// again is a no-op.
    pub fn stop(&mut self) {
        if self.raw_input {
            self.io.source.unsubscribe_raw_input();
            self.raw_input = false;
        }
        if self.window_messages {
            self.io.source.unsubscribe_window_messages();
            self.window_messages = false;
        }
        self.inactivity.stop(&mut self.timers);
        let dropped = self.timers.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "discarding queued tasks");
        }
        self.tracker.abandon_close_polls();
        tracing::info!("telemetry engine stopped");
    }

    /// Handle one native notification.
    ///
    /// Raw input is decoded immediately because the handle is only valid for
    /// the duration of the notification.
    pub fn dispatch(&mut self, event: NativeEvent) {
        match event {
            NativeEvent::RawInput { handle, time } => self.raw_input_arrived(handle, time),
            NativeEvent::PowerSuspend => self.power_suspend(),
            NativeEvent::PowerResume => self.power_resume(),
            deferred => {
                let now = self.now();
                self.timers.post(now, Task::Deferred(deferred));
            }
        }
    }

    /// Feed an already-decoded sample.
    pub fn handle_input(&mut self, sample: InputSample) {
        self.transparency.record_sample(&sample);

        let now = self.now();
        if let Some(record) = self.inactivity.on_input(&mut self.timers, now) {
            self.emit(record);
        }

        let records = match &sample {
            InputSample::Keyboard(key) if self.settings.sources.keyboard => {
                self.typing.process(key, self.io.modifiers.as_ref())
            }
            InputSample::Pointer(pointer) if self.settings.sources.mouse => {
                self.pointer.process(pointer, self.io.modifiers.as_ref())
            }
            _ => Vec::new(),
        };
        self.emit_all(records);
    }

    /// Run every task that is due. Returns how many ran.
    pub fn run_due(&mut self) -> usize {
        let mut ran = 0;
        loop {
            let now = self.now();
            let Some((id, task)) = self.timers.pop_due(now) else {
                break;
            };
            ran += 1;
            match task {
                Task::Deferred(event) => self.handle_deferred(event),
                Task::InactivityTimeout => {
                    if let Some(record) = self.inactivity.on_timeout(id) {
                        self.emit(record);
                    }
                }
                Task::ConfirmClose(pending) => {
                    let record = self.tracker.confirm_close(
                        pending,
                        self.io.windows.as_ref(),
                        &mut self.timers,
                        now,
                    );
                    self.emit_all(record);
                }
            }
        }
        ran
    }

    /// Clock time of the earliest pending task.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// How long until the next task is due.
    pub fn time_until_next_task(&self) -> Option<Duration> {
        let deadline = self.next_deadline()?;
        Some(Duration::from_millis(deadline.saturating_sub(self.now())))
    }

    fn raw_input_arrived(&mut self, handle: RawInputHandle, time: u32) {
        if !self.raw_input {
            return;
        }
        match self.decoder.decode(self.io.raw_input.as_ref(), handle, time) {
            Ok(sample) => self.handle_input(sample),
            Err(e) => {
                self.transparency.record_decode_failure();
                tracing::debug!(error = %e, "dropping raw input packet");
            }
        }
    }

    fn handle_deferred(&mut self, event: NativeEvent) {
        let now = self.now();
        let windows = self.io.windows.as_ref();
        let records = match event {
            NativeEvent::WindowCreated(handle) => self.tracker.window_created(handle, windows),
            NativeEvent::WindowDestroyed(handle) => {
                self.tracker.window_destroyed(handle, &mut self.timers, now);
                Vec::new()
            }
            NativeEvent::WindowActivated(handle) => {
                let handle = handle.or_else(|| self.io.source.current_window_handle());
                self.tracker.window_activated(handle, windows)
            }
            NativeEvent::SettingChange { action, area } => {
                vec![setting_change_record(action, area)]
            }
            NativeEvent::DisplayChange { width, height, bpp } => {
                vec![Metric::ConfigResolution(Resolution { width, height, bpp })]
            }
            NativeEvent::RawInput { .. } | NativeEvent::PowerSuspend | NativeEvent::PowerResume => {
                Vec::new()
            }
        };
        self.emit_all(records);
    }

    fn power_suspend(&mut self) {
        self.suspended = true;
        self.emit(Metric::PowerSuspend);
        if let Some(record) = self.inactivity.on_suspend(&mut self.timers) {
            self.emit(record);
        }
    }

    fn power_resume(&mut self) {
        // Both resume broadcasts usually arrive; report the first.
        if !self.suspended {
            return;
        }
        self.suspended = false;
        self.emit(Metric::PowerResume);
    }

    fn now(&self) -> u64 {
        self.io.clock.now_ms()
    }

    fn emit_all(&self, records: impl IntoIterator<Item = Metric>) {
        for record in records {
            self.emit(record);
        }
    }

    fn emit(&self, record: Metric) {
        let name = record.name();
        self.transparency.record_metric(name);
        self.io.sink.record(name, record.fields());
    }
}

fn setting_change_record(action: u32, area: Option<String>) -> Metric {
    if action != 0 {
        Metric::ConfigSpi { action }
    } else {
        Metric::Config {
            area: area.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_change_prefers_spi_action() {
        assert_eq!(
            setting_change_record(0x2F, Some("Policy".into())),
            Metric::ConfigSpi { action: 0x2F }
        );
        assert_eq!(
            setting_change_record(0, Some("intl".into())),
            Metric::Config {
                area: "intl".into()
            }
        );
        assert_eq!(
            setting_change_record(0, None),
            Metric::Config {
                area: String::new()
            }
        );
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            input_metrics: false,
            close_timeout: Duration::from_secs(5),
            ..Config::default()
        };
        let settings = EngineSettings::from_config(&config);
        assert!(!settings.input_metrics);
        assert_eq!(settings.tracker.close_timeout, Duration::from_secs(5));
        assert_eq!(settings.tracker.own_process_id, std::process::id());
    }
}
