//! Quill Daemon - Streaming Content Generation Service
//!
//! Serves the generation pipeline over HTTP. Clients post a request and
//! read the response as a stream of `data:` frames.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (127.0.0.1:3000, config from ~/.config/quill/config.toml)
//! GEMINI_API_KEY=... quill-daemon
//!
//! # Custom bind address and config file
//! quill-daemon --bind 0.0.0.0:8080 --config /etc/quill/config.toml
//!
//! # No typing delays (useful behind another proxy or in demos)
//! quill-daemon --no-pacing
//!
//! # Verbose logging
//! RUST_LOG=debug quill-daemon
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: Graceful shutdown

mod server;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use quill_core::{load_config_from_path, ConfigOverrides};
use server::DaemonServer;

/// Quill Daemon - Streaming content generation service
#[derive(Parser, Debug)]
#[command(name = "quill-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Listen address (overrides config and QUILL_BIND)
    #[arg(short = 'b', long, value_name = "ADDR")]
    bind: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "QUILL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Provider model (overrides config and QUILL_MODEL)
    #[arg(short = 'm', long, value_name = "MODEL")]
    model: Option<String>,

    /// Disable typing delays between stages and chunks
    #[arg(long)]
    no_pacing: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "QUILL_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("quill_daemon={level},quill_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Resolve once SIGINT or SIGTERM arrives
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, initiating shutdown"),
        () = terminate => info!("Received SIGTERM, initiating shutdown"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging first
    init_logging(&args.log_level);

    info!("Quill daemon starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.clone().or_else(quill_core::default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(bind) = args.bind {
        overrides = overrides.with_bind(bind);
    }
    if let Some(model) = args.model {
        overrides = overrides.with_model(model);
    }
    if args.no_pacing {
        overrides = overrides.without_pacing();
    }
    overrides.apply(&mut config);

    info!(
        source = %config.source(),
        bind = %config.server.bind,
        model = %config.provider.model,
        pacing = config.pacing.enabled,
        "Configuration resolved"
    );

    let server = DaemonServer::new(&config)?;
    let result = server.run(shutdown_signal()).await;

    match result {
        Ok(()) => {
            info!("Quill daemon stopped cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Daemon stopped with error");
            Err(e)
        }
    }
}
