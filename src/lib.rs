//! Input Telemetry - privacy-first window and input telemetry.
//!
//! This library turns raw operating-system signals (shell notifications,
//! raw keyboard and mouse packets, power and setting broadcasts) into
//! de-identified metric records: application launches and closes, focus
//! changes, typing-session summaries, pointer travel and idle transitions.
//!
//! # Privacy Guarantees
//!
//! - **No typed text**: printable keys are never named unless CTRL is held
//! - **No coordinates**: only distance travelled between clicks is reported
//! - **No user paths**: executable paths are rewritten relative to
//!   well-known folders (`%APPDATA%\app.exe`)
//! - **Transparency**: everything observed and reported is counted
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Telemetry Engine                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  shell msgs ──▶ run queue ──▶ WindowActivityTracker ──┐      │
//! │                                  (PathGenericizer)    │      │
//! │  raw input ──▶ RawInputDecoder ─┬▶ TypingSession ─────┤      │
//! │                                 ├▶ PointerMotion ─────┼──▶ MetricsSink
//! │                                 └▶ InactivityMonitor ─┤      │
//! │  power / settings ────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use input_telemetry::engine::{Collaborators, EngineSettings, SystemClock, TelemetryEngine};
//! use input_telemetry::platform::{ChannelSource, NoopQueries};
//! use input_telemetry::sink::MemorySink;
//!
//! let source = ChannelSource::new();
//! let sink = MemorySink::new();
//! let mut engine = TelemetryEngine::new(
//!     EngineSettings::default(),
//!     Collaborators {
//!         source: Box::new(source.clone()),
//!         windows: Box::new(NoopQueries),
//!         raw_input: Box::new(NoopQueries),
//!         modifiers: Box::new(NoopQueries),
//!         sink: Box::new(sink.clone()),
//!         clock: Box::new(SystemClock::new()),
//!     },
//! );
//! engine.start().expect("subscriptions");
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod engine;
pub mod platform;
pub mod sink;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use collector::{InputSample, KeyboardSample, ModifierKeys, PointerSample, RawInputDecoder};
pub use config::{Config, ConfigError, SourceConfig};
pub use core::{Metric, PathGenericizer};
pub use engine::{Collaborators, EngineSettings, TelemetryEngine};
pub use platform::{NativeEvent, NativeEventSource, WindowHandle, WindowQuery};
pub use sink::{JsonlSink, MemorySink, MetricsSink};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              INPUT TELEMETRY - PRIVACY DECLARATION               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This engine reports how applications and input devices are      ║
║  used, never what is typed or shown.                             ║
║                                                                  ║
║  ✓ WHAT WE REPORT:                                               ║
║    • Which applications start, gain focus, lose focus and exit   ║
║    • Time between key releases and typing-session summaries      ║
║    • Names of editing/navigation keys (Backspace, arrows, ...)   ║
║    • Distance the pointer travelled between clicks               ║
║    • When you become idle or active, and power/display changes   ║
║                                                                  ║
║  ✗ WHAT WE NEVER REPORT:                                         ║
║    • Which letters, digits or symbols you type                   ║
║      (only CTRL shortcuts such as Ctrl+C are named)              ║
║    • Where your cursor is (no screen positions)                  ║
║    • Your user name inside file paths                            ║
║    • Window titles or any screen content                         ║
║                                                                  ║
║  You can view collection statistics anytime with:                ║
║    input-telemetry status                                        ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
