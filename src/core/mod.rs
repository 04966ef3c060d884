//! Core aggregation logic.
//!
//! This module contains:
//! - Path genericization for anything that leaves the engine
//! - Typing-session and pointer-motion aggregation
//! - Idle detection
//! - Window and application lifecycle tracking
//! - The metric records all of the above produce

pub mod inactivity;
pub mod metrics;
pub mod paths;
pub mod pointer;
pub mod tracker;
pub mod typing;

pub use inactivity::{InactivityMonitor, InactivityState};
pub use metrics::Metric;
pub use paths::{Environment, PathGenericizer, ProcessEnvironment};
pub use pointer::{PointerMotionAggregator, PointerState};
pub use tracker::{
    ActiveWindowState, RunningApplication, TrackerSettings, WindowActivityTracker, WindowInfo,
};
pub use typing::{TypingSessionAggregator, TypingSessionState};
