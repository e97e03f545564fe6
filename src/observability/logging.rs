//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Bridge log events into OpenTelemetry spans when a tracer is supplied
//! - Configure log level at runtime
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured directive
//! - JSON format for production, pretty format for development
//! - Installing twice is not an error; the first subscriber stays

use opentelemetry_sdk::trace::Tracer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global subscriber. Returns `false` if one was already installed.
pub fn init_subscriber(config: &ObservabilityConfig, tracer: Option<Tracer>) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let otel_layer = tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t));

    let registry = tracing_subscriber::registry().with(filter).with(otel_layer);
    let result = if config.log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.is_ok()
}

/// Console-only logging for short-lived tools.
pub fn init_basic(default_directive: &str) -> bool {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .is_ok()
}
