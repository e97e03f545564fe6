//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs and bind addresses
//! - Validate value ranges (intervals > 0, bounds ordered, ratios in [0, 1])
//! - Validate the optional Sentry DSN
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DashboardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::DashboardConfig;
use crate::downloads::MAX_ERROR_LOG_ENTRIES;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &DashboardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }

    check_http_url(&mut errors, "api.base_url", &config.api.base_url);
    if config.api.timeout_secs == 0 {
        errors.push(ValidationError::new("api.timeout_secs", "must be > 0"));
    }

    if config.health.interval_secs == 0 {
        errors.push(ValidationError::new("health.interval_secs", "must be > 0"));
    }

    let downloads = &config.downloads;
    if downloads.min_file_id > downloads.max_file_id {
        errors.push(ValidationError::new(
            "downloads.min_file_id",
            format!(
                "{} is greater than max_file_id {}",
                downloads.min_file_id, downloads.max_file_id
            ),
        ));
    }
    if downloads.progress_ticks == 0 {
        errors.push(ValidationError::new("downloads.progress_ticks", "must be > 0"));
    }
    if downloads.tick_interval_ms == 0 {
        errors.push(ValidationError::new("downloads.tick_interval_ms", "must be > 0"));
    }
    if downloads.error_log_capacity == 0 || downloads.error_log_capacity > MAX_ERROR_LOG_ENTRIES {
        errors.push(ValidationError::new(
            "downloads.error_log_capacity",
            format!("must be within 1..={}", MAX_ERROR_LOG_ENTRIES),
        ));
    }

    let observability = &config.observability;
    if let Some(endpoint) = &observability.otlp_endpoint {
        check_http_url(&mut errors, "observability.otlp_endpoint", endpoint);
    }
    if let Some(dsn) = &observability.sentry_dsn {
        if let Err(e) = dsn.parse::<sentry::types::Dsn>() {
            errors.push(ValidationError::new(
                "observability.sentry_dsn",
                format!("invalid DSN: {}", e),
            ));
        }
    }
    if !matches!(
        observability.sampler.as_str(),
        "always_on" | "always_off" | "trace_id_ratio"
    ) {
        errors.push(ValidationError::new(
            "observability.sampler",
            format!("unknown sampler '{}'", observability.sampler),
        ));
    }
    if !(0.0..=1.0).contains(&observability.sample_ratio) {
        errors.push(ValidationError::new(
            "observability.sample_ratio",
            "must be within [0.0, 1.0]",
        ));
    }
    if !matches!(observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format '{}'", observability.log_format),
        ));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    check_http_url(&mut errors, "links.jaeger_url", &config.links.jaeger_url);
    check_http_url(&mut errors, "links.sentry_url", &config.links.sentry_url);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_http_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
    }
}
