//! Input Telemetry CLI
//!
//! Privacy-first window and input telemetry.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use input_telemetry::{
    config::{Config, SourceConfig},
    engine::EngineSettings,
    sink::JsonlSink,
    transparency::{create_shared_log_with_persistence, SharedTransparencyLog},
    PRIVACY_DECLARATION, VERSION,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "input-telemetry")]
#[command(version = VERSION)]
#[command(about = "Privacy-first window and input telemetry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start collecting telemetry
    Start {
        /// Input sources to aggregate (keyboard, mouse, or all)
        #[arg(long, default_value = "all")]
        sources: String,

        /// Report window activity only; never subscribe to raw input
        #[arg(long)]
        no_input: bool,
    },

    /// Show current collection status
    Status,

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { sources, no_input } => cmd_start(&sources, no_input),
        Commands::Status => cmd_status(),
        Commands::Privacy => {
            println!("{PRIVACY_DECLARATION}");
            Ok(())
        }
        Commands::Config => cmd_config(),
    }
}

fn cmd_start(sources: &str, no_input: bool) -> Result<()> {
    println!("Input Telemetry v{VERSION}");
    println!();

    let source_config = SourceConfig::from_csv(sources);
    if !source_config.any_enabled() {
        bail!("at least one source must be enabled (keyboard or mouse)");
    }

    let mut config = Config::load().context("loading configuration")?;
    config.sources = source_config;
    if no_input {
        config.input_metrics = false;
    }
    if let Err(e) = config.ensure_directories() {
        tracing::warn!(error = %e, "could not create data directories");
    }

    println!("Starting collection...");
    println!("  Keyboard: {}", enabled(config.sources.keyboard));
    println!("  Mouse: {}", enabled(config.sources.mouse));
    println!("  Input metrics: {}", enabled(config.input_metrics));
    println!(
        "  Inactivity timeout: {}s",
        config.inactivity_timeout.as_secs()
    );
    println!("  Metrics file: {}", config.metrics_file().display());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let transparency_log = create_shared_log_with_persistence(config.transparency_file());
    let sink = JsonlSink::create(&config.metrics_file()).context("opening metrics file")?;
    println!("Instance ID: {}", sink.instance());

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")?;

    let settings = EngineSettings::from_config(&config);
    run_engine(settings, sink, transparency_log.clone(), running)?;

    println!();
    println!("Stopping collection...");
    if let Err(e) = transparency_log.save() {
        tracing::warn!(error = %e, "could not save transparency log");
    }
    println!();
    println!("{}", transparency_log.summary());
    Ok(())
}

#[cfg(target_os = "windows")]
fn run_engine(
    settings: EngineSettings,
    sink: JsonlSink,
    transparency: SharedTransparencyLog,
    running: Arc<AtomicBool>,
) -> Result<()> {
    input_telemetry::platform::windows::run_message_loop(
        settings,
        Box::new(sink),
        transparency,
        running,
    )
    .context("running Win32 message loop")
}

#[cfg(not(target_os = "windows"))]
fn run_engine(
    settings: EngineSettings,
    sink: JsonlSink,
    transparency: SharedTransparencyLog,
    running: Arc<AtomicBool>,
) -> Result<()> {
    use input_telemetry::engine::{Collaborators, Runtime, SystemClock, TelemetryEngine};
    use input_telemetry::platform::{ChannelSource, NoopQueries};

    tracing::warn!("no native event source on this platform; only injected events are processed");

    let source = ChannelSource::new();
    let events = source.receiver().clone();
    let mut engine = TelemetryEngine::new(
        settings,
        Collaborators {
            source: Box::new(source),
            windows: Box::new(NoopQueries),
            raw_input: Box::new(NoopQueries),
            modifiers: Box::new(NoopQueries),
            sink: Box::new(sink),
            clock: Box::new(SystemClock::new()),
        },
    )
    .with_transparency_log(transparency);

    engine.start().context("starting engine")?;
    Runtime::new(&mut engine, events).run(&running);
    engine.stop();
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = Config::load().context("loading configuration")?;

    println!("Input Telemetry Status");
    println!("======================");
    println!();
    println!("Configuration:");
    println!("  Keyboard aggregation: {}", enabled(config.sources.keyboard));
    println!("  Mouse aggregation: {}", enabled(config.sources.mouse));
    println!("  Input metrics: {}", enabled(config.input_metrics));
    println!(
        "  Inactivity timeout: {}s",
        config.inactivity_timeout.as_secs()
    );
    println!();

    let transparency_log = create_shared_log_with_persistence(config.transparency_file());
    println!("{}", transparency_log.summary());
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = Config::load().context("loading configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}
