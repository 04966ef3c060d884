//! Channel-driven engine loop.

use super::TelemetryEngine;
use crate::platform::NativeEvent;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Longest sleep between checks of the running flag.
const MAX_WAIT: Duration = Duration::from_millis(100);

/// Drives a [`TelemetryEngine`] from a channel of native events.
pub struct Runtime<'a> {
    engine: &'a mut TelemetryEngine,
    events: Receiver<NativeEvent>,
}

impl<'a> Runtime<'a> {
    pub fn new(engine: &'a mut TelemetryEngine, events: Receiver<NativeEvent>) -> Self {
        Self { engine, events }
    }

    /// Process events and due tasks until `running` is cleared or every
    /// sender is gone.
    pub fn run(&mut self, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            let wait = self
                .engine
                .time_until_next_task()
                .map_or(MAX_WAIT, |until| until.min(MAX_WAIT));

            match self.events.recv_timeout(wait) {
                Ok(event) => self.engine.dispatch(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("event source disconnected");
                    break;
                }
            }
            self.engine.run_due();
        }
    }

    /// Process everything already queued without blocking. Returns the
    /// number of events dispatched.
    pub fn drain(&mut self) -> usize {
        let mut dispatched = 0;
        loop {
            self.engine.run_due();
            match self.events.try_recv() {
                Ok(event) => {
                    self.engine.dispatch(event);
                    dispatched += 1;
                }
                Err(_) => break,
            }
        }
        self.engine.run_due();
        dispatched
    }
}
