//! Livecast Player - Main entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use livecast_common::config::{load_or_default, ConfigOrigin};
use livecast_player::api::{self, AppContext};
use livecast_player::config::{Config, ConfigOverrides};
use livecast_player::playback::ProcessSink;
use livecast_player::source::HttpLiveSource;
use livecast_player::{SessionPoller, SharedState};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for livecast-player
#[derive(Parser, Debug)]
#[command(name = "livecast-player")]
#[command(about = "Live commentary player with reply interruption")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the commentary server
    #[arg(short, long, env = "LIVECAST_SERVER_URL")]
    server_url: Option<String>,

    /// Port for the control API
    #[arg(short, long, env = "LIVECAST_PORT")]
    port: Option<u16>,

    /// Commentary language requested on go-live
    #[arg(short, long, env = "LIVECAST_LANGUAGE")]
    language: Option<String>,

    /// Go live immediately after startup
    #[arg(long)]
    auto_start: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first so its log level applies; RUST_LOG still wins
    let (file_config, origin) = load_or_default(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                let level = &file_config.logging.level;
                format!(
                    "livecast_player={level},livecast_common={level},tower_http=info",
                    level = level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &origin {
        ConfigOrigin::Defaults => info!("No config file found, using built-in defaults"),
        ConfigOrigin::File(path) => info!("Loaded configuration from {}", path.display()),
        ConfigOrigin::Rejected { path, error } => {
            warn!("Ignoring config file {}: {}", path.display(), error)
        }
    }

    let config = Config::resolve(
        file_config,
        ConfigOverrides {
            server_url: args.server_url,
            port: args.port,
            language: args.language,
            auto_start: args.auto_start,
        },
    )
    .context("Invalid configuration")?;

    info!(
        server_url = %config.server_url,
        language = %config.language,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Starting Livecast Player on port {}",
        config.port
    );

    let source = HttpLiveSource::new(&config.server_url, config.request_timeout)
        .context("Failed to create live source")?;

    let (sink_tx, sink_rx) = mpsc::unbounded_channel();
    let sink = ProcessSink::new(config.player.program.clone(), config.player.args.clone(), sink_tx);

    let state = Arc::new(SharedState::new());
    let (poller, handle) = SessionPoller::new(
        Arc::new(source),
        Box::new(sink),
        sink_rx,
        Arc::clone(&state),
        config.poll_interval,
        config.language.clone(),
    );
    let poller_task = tokio::spawn(poller.run());

    if config.auto_start {
        info!("Auto-start enabled, going live");
        handle
            .go_live(None)
            .await
            .context("Failed to request go-live")?;
    }

    let ctx = AppContext {
        state,
        poller: handle.clone(),
    };
    let served = api::run(config.port, ctx, shutdown_signal()).await;

    // Halt whatever clip is playing before exiting
    if handle.shutdown().await.is_err() {
        warn!("Session poller already stopped");
    }
    if let Err(e) = poller_task.await {
        warn!("Session poller task failed: {}", e);
    }

    served.context("HTTP server failed")?;
    info!("Shutdown complete");
    Ok(())
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
