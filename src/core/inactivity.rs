//! Debounced idle detection.
//!
//! Any input re-arms a single timer. When the timer fires without further
//! input the user is considered inactive until the next sample arrives.

use crate::core::metrics::Metric;
use crate::engine::scheduler::{Scheduler, TaskId};
use crate::engine::Task;
use std::time::Duration;

/// Default idle period before `user-inactive` is reported.
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InactivityState {
    pub inactive: bool,
    pub pending_timer: Option<TaskId>,
}

#[derive(Debug)]
pub struct InactivityMonitor {
    state: InactivityState,
    timeout: Duration,
}

impl Default for InactivityMonitor {
    fn default() -> Self {
        Self::new(INACTIVITY_TIMEOUT)
    }
}

impl InactivityMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: InactivityState::default(),
            timeout,
        }
    }

    pub fn state(&self) -> InactivityState {
        self.state
    }

    pub fn is_inactive(&self) -> bool {
        self.state.inactive
    }

    /// Arm the timer without reporting anything.
    pub fn start(&mut self, timers: &mut Scheduler<Task>, now: u64) {
        self.rearm(timers, now);
    }

    /// Any decoded sample, injected ones included.
    pub fn on_input(&mut self, timers: &mut Scheduler<Task>, now: u64) -> Option<Metric> {
        let record = if self.state.inactive {
            self.state.inactive = false;
            Some(Metric::UserActive)
        } else {
            None
        };
        self.rearm(timers, now);
        record
    }

    /// The inactivity timer fired. Stale timers are ignored.
    pub fn on_timeout(&mut self, id: TaskId) -> Option<Metric> {
        if self.state.pending_timer != Some(id) {
            return None;
        }
        self.state.pending_timer = None;
        self.go_inactive(false)
    }

    /// The system is about to sleep.
    pub fn on_suspend(&mut self, timers: &mut Scheduler<Task>) -> Option<Metric> {
        self.stop(timers);
        self.go_inactive(true)
    }

    pub fn stop(&mut self, timers: &mut Scheduler<Task>) {
        if let Some(id) = self.state.pending_timer.take() {
            timers.cancel(id);
        }
    }

    fn rearm(&mut self, timers: &mut Scheduler<Task>, now: u64) {
        self.stop(timers);
        self.state.pending_timer = Some(timers.schedule(now, self.timeout, Task::InactivityTimeout));
    }

    fn go_inactive(&mut self, sleep: bool) -> Option<Metric> {
        if self.state.inactive {
            return None;
        }
        self.state.inactive = true;
        tracing::debug!(sleep, "user became inactive");
        Some(Metric::UserInactive { sleep })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const TIMEOUT_MS: u64 = 300_000;

    fn fire_due(
        monitor: &mut InactivityMonitor,
        timers: &mut Scheduler<Task>,
        now: u64,
    ) -> Vec<Metric> {
        let mut records = Vec::new();
        while let Some((id, task)) = timers.pop_due(now) {
            assert_matches!(task, Task::InactivityTimeout);
            records.extend(monitor.on_timeout(id));
        }
        records
    }

    #[test]
    fn test_timeout_reports_inactive_once() {
        let mut timers = Scheduler::new();
        let mut monitor = InactivityMonitor::default();
        assert_eq!(monitor.on_input(&mut timers, 0), None);

        assert!(fire_due(&mut monitor, &mut timers, TIMEOUT_MS - 1).is_empty());
        assert_eq!(
            fire_due(&mut monitor, &mut timers, TIMEOUT_MS),
            vec![Metric::UserInactive { sleep: false }]
        );
        assert!(monitor.is_inactive());
        assert!(timers.is_empty());
    }

    #[test]
    fn test_input_rearms_single_timer() {
        let mut timers = Scheduler::new();
        let mut monitor = InactivityMonitor::default();
        for t in [0, 100_000, 200_000, 299_999] {
            monitor.on_input(&mut timers, t);
        }
        assert_eq!(timers.len(), 1);
        assert!(fire_due(&mut monitor, &mut timers, 500_000).is_empty());
        assert_eq!(fire_due(&mut monitor, &mut timers, 599_999).len(), 1);
    }

    #[test]
    fn test_input_after_idle_reports_active() {
        let mut timers = Scheduler::new();
        let mut monitor = InactivityMonitor::default();
        monitor.start(&mut timers, 0);
        fire_due(&mut monitor, &mut timers, TIMEOUT_MS);

        assert_eq!(monitor.on_input(&mut timers, 400_000), Some(Metric::UserActive));
        assert_eq!(monitor.on_input(&mut timers, 400_010), None);
        assert!(!monitor.is_inactive());
    }

    #[test]
    fn test_suspend_forces_inactive_with_sleep() {
        let mut timers = Scheduler::new();
        let mut monitor = InactivityMonitor::default();
        monitor.on_input(&mut timers, 0);

        assert_eq!(
            monitor.on_suspend(&mut timers),
            Some(Metric::UserInactive { sleep: true })
        );
        assert!(timers.is_empty());
        assert_eq!(monitor.on_suspend(&mut timers), None);
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let mut timers = Scheduler::new();
        let mut monitor = InactivityMonitor::default();
        monitor.on_input(&mut timers, 0);
        let stale = monitor.state().pending_timer;
        monitor.on_input(&mut timers, 10);

        let stale = stale.map(|id| monitor.on_timeout(id));
        assert_eq!(stale, Some(None));
        assert!(!monitor.is_inactive());
    }

    #[test]
    fn test_stop_cancels_timer() {
        let mut timers = Scheduler::new();
        let mut monitor = InactivityMonitor::new(Duration::from_secs(1));
        monitor.start(&mut timers, 0);
        monitor.stop(&mut timers);
        assert!(timers.is_empty());
        assert_eq!(monitor.state().pending_timer, None);
    }
}
