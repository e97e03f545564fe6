//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::DashboardConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Environment variables that override file values.
pub const ENV_API_URL: &str = "DELINEATE_API_URL";
pub const ENV_JAEGER_URL: &str = "DELINEATE_JAEGER_URL";
pub const ENV_SENTRY_URL: &str = "DELINEATE_SENTRY_URL";
pub const ENV_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
pub const ENV_ENVIRONMENT: &str = "DELINEATE_ENVIRONMENT";
pub const ENV_APP_VERSION: &str = "DELINEATE_APP_VERSION";
pub const ENV_BIND_ADDRESS: &str = "DELINEATE_BIND_ADDRESS";
pub const ENV_SENTRY_DSN: &str = "SENTRY_DSN";

/// Load the optional config file, apply process environment overrides, then validate.
pub fn load_with_env(path: Option<&Path>) -> Result<DashboardConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => DashboardConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply overrides using `lookup` to resolve variable names.
///
/// Empty values are ignored so that `VAR=` does not blank out a setting.
pub fn apply_env_overrides<F>(config: &mut DashboardConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_API_URL) {
        config.api.base_url = v;
    }
    if let Some(v) = get(ENV_JAEGER_URL) {
        config.links.jaeger_url = v;
    }
    if let Some(v) = get(ENV_SENTRY_URL) {
        config.links.sentry_url = v;
    }
    if let Some(v) = get(ENV_OTLP_ENDPOINT) {
        config.observability.otlp_endpoint = Some(v);
    }
    if let Some(v) = get(ENV_ENVIRONMENT) {
        config.observability.environment = v;
    }
    if let Some(v) = get(ENV_APP_VERSION) {
        config.observability.service_version = v;
    }
    if let Some(v) = get(ENV_BIND_ADDRESS) {
        config.listener.bind_address = v;
    }
    if let Some(v) = get(ENV_SENTRY_DSN) {
        config.observability.sentry_dsn = Some(v);
    }
}
