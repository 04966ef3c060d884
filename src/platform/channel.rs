//! Channel-backed event source for hosts without a native implementation.
//!
//! Events are pushed by whoever owns the [`Sender`] (a test, an embedding
//! application, or nothing at all on unsupported platforms) and drained by
//! the runtime loop.

use crate::collector::decoder::{OsErrorCode, RawInputQuery};
use crate::collector::types::ModifierKeys;
use crate::platform::{
    ModifierKeyQuery, NativeEvent, NativeEventSource, RawInputHandle, SourceError, WindowHandle,
    WindowQuery,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// `ERROR_INVALID_HANDLE`
const ERROR_INVALID_HANDLE: OsErrorCode = 6;

/// Subscription state shared between a [`ChannelSource`] and its observers.
#[derive(Debug, Default)]
struct SubscriptionFlags {
    window_messages: AtomicBool,
    raw_input: AtomicBool,
    /// Foreground window reported by `current_window_handle`; 0 means none.
    foreground: AtomicU64,
}

/// An event source backed by a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSource {
    sender: Sender<NativeEvent>,
    receiver: Receiver<NativeEvent>,
    flags: Arc<SubscriptionFlags>,
}

impl ChannelSource {
    /// Create a new channel source.
    pub fn new() -> Self {
        // Use a bounded channel to prevent unbounded memory growth
        let (sender, receiver) = bounded(10_000);
        Self {
            sender,
            receiver,
            flags: Arc::new(SubscriptionFlags::default()),
        }
    }

    /// Sender for injecting events.
    pub fn sender(&self) -> Sender<NativeEvent> {
        self.sender.clone()
    }

    /// Get the receiver for native events.
    pub fn receiver(&self) -> &Receiver<NativeEvent> {
        &self.receiver
    }

    /// Push an event, dropping it if the subscription it belongs to is off.
    pub fn push(&self, event: NativeEvent) -> bool {
        let subscribed = match event {
            NativeEvent::RawInput { .. } => self.is_raw_input_subscribed(),
            _ => self.is_window_messages_subscribed(),
        };
        subscribed && self.sender.try_send(event).is_ok()
    }

    pub fn set_foreground(&self, handle: Option<WindowHandle>) {
        self.flags
            .foreground
            .store(handle.map_or(0, |h| h.0), Ordering::SeqCst);
    }

    pub fn is_window_messages_subscribed(&self) -> bool {
        self.flags.window_messages.load(Ordering::SeqCst)
    }

    pub fn is_raw_input_subscribed(&self) -> bool {
        self.flags.raw_input.load(Ordering::SeqCst)
    }
}

impl Default for ChannelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEventSource for ChannelSource {
    fn subscribe_window_messages(&mut self) -> Result<(), SourceError> {
        self.flags.window_messages.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unsubscribe_window_messages(&mut self) {
        self.flags.window_messages.store(false, Ordering::SeqCst);
    }

    fn subscribe_raw_input(&mut self) -> Result<(), SourceError> {
        self.flags.raw_input.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unsubscribe_raw_input(&mut self) {
        self.flags.raw_input.store(false, Ordering::SeqCst);
    }

    fn current_window_handle(&self) -> Option<WindowHandle> {
        match self.flags.foreground.load(Ordering::SeqCst) {
            0 => None,
            handle => Some(WindowHandle(handle)),
        }
    }
}

/// Queries that know nothing: every window is unresolved and every raw-input
/// handle is invalid.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopQueries;

impl WindowQuery for NoopQueries {
    fn class_name_of(&self, _handle: WindowHandle) -> Option<String> {
        None
    }

    fn process_id_of(&self, _handle: WindowHandle) -> Option<u32> {
        None
    }

    fn executable_path_of(&self, _pid: u32) -> Option<String> {
        None
    }

    fn enumerate_child_windows(
        &self,
        _handle: WindowHandle,
        _visitor: &mut dyn FnMut(WindowHandle) -> bool,
    ) {
    }

    fn is_process_alive(&self, _pid: u32) -> bool {
        false
    }
}

impl RawInputQuery for NoopQueries {
    fn required_size(&self, _handle: RawInputHandle) -> Result<usize, OsErrorCode> {
        Err(ERROR_INVALID_HANDLE)
    }

    fn fill(&self, _handle: RawInputHandle, _buffer: &mut [u8]) -> Result<usize, OsErrorCode> {
        Err(ERROR_INVALID_HANDLE)
    }
}

impl ModifierKeyQuery for NoopQueries {
    fn held_modifiers(&self) -> ModifierKeys {
        ModifierKeys::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_respects_subscriptions() {
        let mut source = ChannelSource::new();
        assert!(!source.push(NativeEvent::PowerSuspend));

        source.subscribe_window_messages().unwrap();
        assert!(source.push(NativeEvent::PowerSuspend));
        assert!(!source.push(NativeEvent::RawInput {
            handle: RawInputHandle(1),
            time: 0
        }));

        source.subscribe_raw_input().unwrap();
        assert!(source.push(NativeEvent::RawInput {
            handle: RawInputHandle(1),
            time: 0
        }));
        assert_eq!(source.receiver().len(), 2);
    }

    #[test]
    fn test_foreground_handle() {
        let source = ChannelSource::new();
        assert_eq!(source.current_window_handle(), None);
        source.set_foreground(Some(WindowHandle(0x42)));
        assert_eq!(source.current_window_handle(), Some(WindowHandle(0x42)));
    }

    #[test]
    fn test_noop_queries_fail_raw_input() {
        assert_eq!(NoopQueries.required_size(RawInputHandle(1)), Err(6));
        assert!(!NoopQueries.is_process_alive(1));
    }
}
