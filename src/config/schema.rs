//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dashboard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the dashboard process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DashboardConfig {
    /// Listener for the dashboard's own JSON surface.
    pub listener: ListenerConfig,

    /// External download API the dashboard talks to.
    pub api: ApiConfig,

    /// Health polling settings.
    pub health: HealthConfig,

    /// File identifier bounds and progress simulation.
    pub downloads: DownloadConfig,

    /// Logging, tracing export and metrics.
    pub observability: ObservabilityConfig,

    /// Read-only links to the tracing and error-tracking UIs.
    pub links: LinksConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8090").
    pub bind_address: String,

    /// Per-request timeout for dashboard endpoints in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8090".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// External API collaborator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the download API (no trailing slash required).
    pub base_url: String,

    /// Timeout for a single API request in seconds.
    pub timeout_secs: u64,

    /// Route requests through proxies from the environment (`HTTP_PROXY`, ...).
    pub use_system_proxy: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 10,
            use_system_proxy: true,
        }
    }
}

/// Health polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Enable background health polling.
    pub enabled: bool,

    /// Poll interval in seconds.
    pub interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
        }
    }
}

/// Download job configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Smallest accepted file identifier (inclusive).
    pub min_file_id: u64,

    /// Largest accepted file identifier (inclusive).
    pub max_file_id: u64,

    /// Number of simulated progress ticks.
    pub progress_ticks: u32,

    /// Interval between progress ticks in milliseconds.
    pub tick_interval_ms: u64,

    /// Maximum number of retained error log entries (at most 10).
    pub error_log_capacity: usize,

    /// How long the latest error-tracking probe result stays visible.
    pub banner_ttl_secs: u64,

    /// File identifier sent by the error-tracking probe.
    pub probe_file_id: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            min_file_id: 10_000,
            max_file_id: 100_000_000,
            progress_ticks: 5,
            tick_interval_ms: 1_000,
            error_log_capacity: 10,
            banner_ttl_secs: 8,
            probe_file_id: 70_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Service name reported on spans.
    pub service_name: String,

    /// Service version reported on spans.
    pub service_version: String,

    /// Deployment environment (development, staging, production).
    pub environment: String,

    /// OTLP/HTTP traces endpoint. Spans are not exported when unset.
    pub otlp_endpoint: Option<String>,

    /// Sampler ("always_on", "always_off", "trace_id_ratio").
    pub sampler: String,

    /// Ratio for the `trace_id_ratio` sampler.
    pub sample_ratio: f64,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Sentry DSN. Error-tracking events only go to the log when unset.
    pub sentry_dsn: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "delineate_dashboard=info,tower_http=info".to_string(),
            log_format: "pretty".to_string(),
            service_name: "delineate-dashboard".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            otlp_endpoint: None,
            sampler: "always_on".to_string(),
            sample_ratio: 1.0,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
            sentry_dsn: None,
        }
    }
}

/// External UI links shown by the trace viewer and error-tracking widgets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Tracing UI (Jaeger) base URL.
    pub jaeger_url: String,

    /// Error-tracking (Sentry) dashboard URL.
    pub sentry_url: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            jaeger_url: "http://localhost:16686".to_string(),
            sentry_url: "https://sentry.io".to_string(),
        }
    }
}
