//! Collaborators provided by the host platform.
//!
//! The engine never talks to the OS directly. Everything it needs (window
//! metadata, raw-input packets, modifier state, subscriptions) goes through
//! the traits below so the correlation logic can be driven by fakes.

use crate::collector::types::ModifierKeys;
use std::fmt;
use thiserror::Error;

pub mod channel;
pub mod message;

#[cfg(target_os = "windows")]
pub mod windows;

pub use channel::{ChannelSource, NoopQueries};
pub use message::{NativeEvent, NativeMessage};

/// Opaque native window handle. Not a stable identity once destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowHandle(pub u64);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Opaque handle to a raw-input packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawInputHandle(pub u64);

/// Errors raised when a native subscription cannot be established.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to register raw input devices (os error {0})")]
    RawInputRegistration(u32),

    #[error("failed to register shell hook window")]
    ShellHookRegistration,

    #[error("failed to create message window: {0}")]
    WindowCreation(String),
}

/// Delivers window/shell notifications and raw-input notifications.
///
/// Subscribe/unsubscribe calls are issued by the engine, which guarantees
/// each is only made when the subscription state actually changes.
pub trait NativeEventSource {
    fn subscribe_window_messages(&mut self) -> Result<(), SourceError>;
    fn unsubscribe_window_messages(&mut self);
    fn subscribe_raw_input(&mut self) -> Result<(), SourceError>;
    fn unsubscribe_raw_input(&mut self);

    /// The window currently in the foreground, if any.
    fn current_window_handle(&self) -> Option<WindowHandle>;
}

/// Window and process metadata lookups.
pub trait WindowQuery {
    fn class_name_of(&self, handle: WindowHandle) -> Option<String>;
    fn process_id_of(&self, handle: WindowHandle) -> Option<u32>;
    fn executable_path_of(&self, pid: u32) -> Option<String>;

    /// Visit child windows of `handle` until `visitor` returns `false`.
    fn enumerate_child_windows(
        &self,
        handle: WindowHandle,
        visitor: &mut dyn FnMut(WindowHandle) -> bool,
    );

    fn is_process_alive(&self, pid: u32) -> bool;
}

/// Current state of the SHIFT/CTRL/ALT keys.
pub trait ModifierKeyQuery {
    fn held_modifiers(&self) -> ModifierKeys;
}
