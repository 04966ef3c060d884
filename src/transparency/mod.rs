//! Transparency module.
//!
//! Tracks and exposes what the engine collects so users can audit it.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, RecordCategory, SharedTransparencyLog,
    TransparencyLog, TransparencyStats,
};
