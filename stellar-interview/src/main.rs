//! Interview player service (stellar-interview) - Main entry point
//!
//! Runs one interview player against the simulated audio backend and
//! exposes it over HTTP/SSE so a host page can drive playback, report
//! visibility and follow the active transcript line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use stellar_common::config::{load_or_default, resolve_config_path};
use stellar_interview::api::{self, AppContext};
use stellar_interview::config::{TomlConfig, CONFIG_ENV_VAR, CONFIG_FILE_NAME};
use stellar_interview::playback::{PlayerHandle, PlayerOptions, SimulatedBackend};
use stellar_interview::transcript::load_transcript_file;
use stellar_interview::visibility::ManualVisibility;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for stellar-interview
#[derive(Parser, Debug)]
#[command(name = "stellar-interview")]
#[command(about = "Interview playback and transcript sync service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "STELLAR_INTERVIEW_PORT")]
    port: Option<u16>,

    /// Config file (TOML)
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Transcript file (TOML `[[line]]` tables)
    #[arg(short, long, env = "STELLAR_TRANSCRIPT")]
    transcript: Option<PathBuf>,

    /// Simulated content duration in milliseconds
    #[arg(long, env = "STELLAR_DURATION_MS")]
    duration_ms: Option<u64>,

    /// Simulated backend preparation delay in milliseconds
    #[arg(long, env = "STELLAR_PREPARE_DELAY_MS")]
    prepare_delay_ms: Option<u64>,

    /// Simulated time update interval in milliseconds
    #[arg(long, env = "STELLAR_TICK_MS")]
    tick_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; the config file may lower or raise the level later
    let (filter, filter_handle) = reload::Layer::new(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter("debug")),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Resolve and load bootstrap config (defaults when absent or broken)
    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR, CONFIG_FILE_NAME);
    let (mut config, loaded_from) = load_or_default::<TomlConfig>(config_path.as_deref());
    match &loaded_from {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("Using built-in configuration defaults"),
    }

    if std::env::var_os("RUST_LOG").is_none() {
        if let Err(e) = filter_handle.reload(default_filter(&config.logging.level)) {
            warn!("Failed to apply log level {}: {}", config.logging.level, e);
        }
    }

    // CLI overrides
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(duration_ms) = args.duration_ms {
        config.simulator.duration_ms = duration_ms;
    }
    if let Some(prepare_delay_ms) = args.prepare_delay_ms {
        config.simulator.prepare_delay_ms = prepare_delay_ms;
    }
    if let Some(tick_ms) = args.tick_ms {
        config.simulator.tick_ms = tick_ms;
    }

    info!("Starting Stellar interview player on port {}", config.port);

    // Transcript problems only disable highlighting
    let transcript = match &args.transcript {
        Some(path) => match load_transcript_file(path) {
            Ok(lines) => {
                info!("Transcript: {} ({} lines)", path.display(), lines.len());
                lines
            }
            Err(e) => {
                warn!("Failed to load transcript {}: {}; continuing without highlighting", path.display(), e);
                Vec::new()
            }
        },
        None => {
            info!("No transcript given; highlighting disabled");
            Vec::new()
        }
    };

    let visibility = Arc::new(ManualVisibility::new());
    let player = PlayerHandle::spawn(
        PlayerOptions::new(transcript)
            .with_config(config.player.clone())
            .with_visibility(visibility.clone()),
    );
    info!("Player {} spawned", player.instance_id());

    let backend = Arc::new(SimulatedBackend::new(config.simulator.clone()));
    player
        .attach(backend)
        .await
        .context("Failed to attach simulated backend")?;

    let ctx = AppContext {
        player: player.clone(),
        visibility,
    };

    api::run(config.port, ctx, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    if let Err(e) = player.shutdown().await {
        warn!("Player shutdown: {}", e);
    }
    info!("Server shutdown complete");
    Ok(())
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "stellar_interview={level},stellar_common={level},tower_http={level}"
    ))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
