//! Delineate observability dashboard
//!
//! Triggers simulated file downloads against the download API, polls its
//! health, and links every request to its trace and error-tracking events.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌───────────────────────────────────────────────────┐
//!                  │                    DASHBOARD                      │
//!                  │                                                   │
//!   CLI / curl     │  ┌─────────┐   ┌───────────┐   ┌──────────────┐  │
//!   ───────────────┼─▶│  http   │──▶│ dashboard │──▶│  downloads   │  │
//!                  │  │ server  │   │ snapshot  │   │ board + sim  │  │
//!                  │  └─────────┘   └─────┬─────┘   └──────┬───────┘  │
//!                  │                      │                │          │
//!                  │                ┌─────▼─────┐   ┌──────▼───────┐  │   Download
//!                  │                │  health   │──▶│  api client  │──┼──▶ API
//!                  │                │  poller   │   │ (traceparent)│  │
//!                  │                └───────────┘   └──────────────┘  │
//!                  │                                                   │
//!                  │  observability: spans → OTLP, logs, metrics,      │
//!                  │                 error tracking with trace tags    │
//!                  └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use delineate_dashboard::config::load_with_env;
use delineate_dashboard::lifecycle::{self, signals, Shutdown};
use delineate_dashboard::observability::error_tracking::build_reporter;
use delineate_dashboard::observability::{self, metrics};

#[derive(Parser)]
#[command(name = "delineate-dashboard")]
#[command(about = "Observability demo dashboard", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "DELINEATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_with_env(cli.config.as_deref())?;

    observability::init_telemetry(&config.observability)?;

    tracing::info!(
        version = %config.observability.service_version,
        environment = %config.observability.environment,
        api = %config.api.base_url,
        "delineate-dashboard starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let reporter = build_reporter(&config.observability);
    let app = lifecycle::assemble(&config, reporter.clone())?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let poller = tokio::spawn(app.poller.run(shutdown.subscribe()));
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(signals::forward_signals(shutdown.clone()));

    let served = app.server.run(listener, server_shutdown).await;

    shutdown.trigger();
    if let Err(e) = poller.await {
        tracing::warn!(error = %e, "Health poller ended abnormally");
    }
    app.board.shutdown();

    let flushed = tokio::task::spawn_blocking(move || reporter.flush(Duration::from_secs(2))).await?;
    if !flushed {
        tracing::warn!("Error-tracking events were still queued at exit");
    }
    tokio::task::spawn_blocking(observability::shutdown_telemetry).await?;
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}
