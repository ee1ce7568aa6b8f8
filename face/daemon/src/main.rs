//! Face Daemon - Companion Face Display Driver
//!
//! Loads the frame assets, opens a presentation sink and drives the face
//! from stimuli read on stdin.
//!
//! # Usage
//!
//! ```bash
//! # Headless, frames are only logged
//! face-daemon --assets ./assets
//!
//! # Physical panel through the framebuffer
//! face-daemon --sink framebuffer --framebuffer /dev/fb1
//!
//! # Desktop simulator pacing
//! face-daemon --idle-drift-secs 60
//!
//! # Scripted run
//! printf 'laugh\ntouch head 2\n' | face-daemon --exit-on-eof
//!
//! # Verbose logging
//! RUST_LOG=debug face-daemon
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: Graceful shutdown

mod input;
mod sinks;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use face_core::config::SIMULATOR_IDLE_DRIFT_SECS;
use face_core::{
    load_config, load_config_from_path, ConfigOverrides, DirectorySource, ExpressionMachine,
    FaceCommand, FaceRuntime, FrameStore, PresentationSink, RunOutcome,
};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use sinks::{FramebufferSink, LogSink};

/// Mailbox depth between the listeners and the runtime
const COMMAND_BUFFER: usize = 32;

/// Face Daemon - drives the companion face display
#[derive(Parser, Debug)]
#[command(name = "face-daemon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "FACE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Asset directory (one subdirectory per animation)
    ///
    /// Frames are `*.rgb565` raw panel buffers unless `[assets] extension`
    /// says otherwise.
    #[arg(short = 'a', long, value_name = "DIR")]
    assets: Option<PathBuf>,

    /// Where frames go
    #[arg(long, value_enum, default_value_t = SinkKind::Log)]
    sink: SinkKind,

    /// Framebuffer device for `--sink framebuffer`
    #[arg(long, value_name = "PATH", default_value = "/dev/fb1")]
    framebuffer: PathBuf,

    /// Idle seconds before the face glances around
    #[arg(long, value_name = "SECS")]
    idle_drift_secs: Option<u64>,

    /// Use the desktop simulator's slower idle drift
    #[arg(long, conflicts_with = "idle_drift_secs")]
    simulator_timing: bool,

    /// Scheduler tick period
    #[arg(long, value_name = "MS")]
    tick_ms: Option<u64>,

    /// How long a finished expression lingers before the face rests
    #[arg(long, value_name = "MS")]
    event_hold_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "FACE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Shut down when stdin reaches end of file
    #[arg(long)]
    exit_on_eof: bool,
}

/// Presentation sink selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    /// Log frames only
    Log,
    /// Write frames to a framebuffer device
    Framebuffer,
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("face_daemon={level},face_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn overrides(args: &Args) -> ConfigOverrides {
    let mut overrides = ConfigOverrides::new();
    if let Some(ref dir) = args.assets {
        overrides = overrides.with_assets_dir(dir.clone());
    }
    let drift = args
        .idle_drift_secs
        .or(args.simulator_timing.then_some(SIMULATOR_IDLE_DRIFT_SECS));
    if let Some(secs) = drift {
        overrides = overrides.with_idle_drift_secs(secs);
    }
    if let Some(ms) = args.tick_ms {
        overrides = overrides.with_tick_ms(ms);
    }
    if let Some(ms) = args.event_hold_ms {
        overrides = overrides.with_event_hold_ms(ms);
    }
    overrides
}

fn open_sink(args: &Args) -> Result<Box<dyn PresentationSink>> {
    match args.sink {
        SinkKind::Log => Ok(Box::new(LogSink::new())),
        SinkKind::Framebuffer => {
            let sink = FramebufferSink::open(&args.framebuffer)
                .context("Failed to open presentation sink")?;
            info!(path = %sink.path().display(), "Presenting to framebuffer");
            Ok(Box::new(sink))
        }
    }
}

/// Send `Shutdown` on SIGINT or SIGTERM
async fn forward_signals(commands: mpsc::Sender<FaceCommand>) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for SIGINT");
                return;
            }
            info!("Received SIGINT, initiating shutdown");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }

    let _ = commands.send(FaceCommand::Shutdown).await;
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!("Face daemon starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match args.config {
        Some(ref path) => load_config_from_path(Some(path.clone())),
        None => load_config(),
    }
    .context("Failed to load configuration")?;
    overrides(&args).apply(&mut config);
    config
        .validate()
        .context("Invalid command-line configuration")?;

    info!(
        source = %config.source(),
        assets = %config.assets.dir.display(),
        idle_drift = ?config.behavior.idle_drift,
        "Configuration resolved"
    );

    let source = DirectorySource::new(config.assets.dir.clone(), config.assets.extension.clone());
    if !source.is_raw() {
        warn!(
            extension = %config.assets.extension,
            "Frames are encoded images and are presented undecoded"
        );
    }
    let store = FrameStore::load(&source)
        .with_context(|| format!("Failed to load frames from {}", source.root().display()))?;
    let missing = store.missing();
    if !missing.is_empty() {
        warn!(?missing, "Some animations have no frames");
    }

    let sink = open_sink(&args)?;

    let machine = ExpressionMachine::new(
        Arc::new(store),
        &config,
        tokio::time::Instant::now().into_std(),
    );
    let runtime = FaceRuntime::new(machine, sink, &config);

    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    tokio::spawn(forward_signals(tx.clone()));

    let exit_on_eof = args.exit_on_eof;
    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        if let Err(e) = input::listen(stdin, tx, exit_on_eof).await {
            error!(error = %e, "Failed to read stdin");
        }
    });

    let outcome = runtime.run(rx).await;
    info!(?outcome, "Face daemon stopped");

    if outcome == RunOutcome::SinkClosed {
        anyhow::bail!("Presentation surface closed");
    }
    Ok(())
}
