//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the API client and the error reporter from configuration
//! - Wire the job board, health store, poller and HTTP server together
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Telemetry is initialized by the caller before assembly so that the
//!   first spans already have a provider

use std::sync::Arc;

use crate::api::{ApiBackend, ApiClient, ApiError};
use crate::config::DashboardConfig;
use crate::dashboard::{Dashboard, ObservabilityLinks};
use crate::downloads::JobBoard;
use crate::health::{HealthPoller, HealthStore};
use crate::http::DashboardServer;
use crate::observability::error_tracking::ErrorReporter;

/// Everything the process runs, ready to be started.
pub struct App {
    pub dashboard: Arc<Dashboard>,
    pub board: Arc<JobBoard>,
    pub poller: HealthPoller,
    pub server: DashboardServer,
}

/// Assemble the app against the configured download API.
pub fn assemble(config: &DashboardConfig, reporter: Arc<dyn ErrorReporter>) -> Result<App, ApiError> {
    let api: Arc<dyn ApiBackend> = Arc::new(ApiClient::new(&config.api, reporter.clone())?);
    Ok(assemble_with_backend(config, api, reporter))
}

/// Assemble the app against any backend.
pub fn assemble_with_backend(
    config: &DashboardConfig,
    api: Arc<dyn ApiBackend>,
    reporter: Arc<dyn ErrorReporter>,
) -> App {
    let board = Arc::new(JobBoard::new(api.clone(), reporter, &config.downloads));
    let health = Arc::new(HealthStore::new());

    let dashboard = Arc::new(Dashboard::new(
        board.clone(),
        health.clone(),
        ObservabilityLinks::from_config(&config.links),
        api.base_url().to_string(),
        config.observability.service_version.clone(),
        config.observability.environment.clone(),
    ));

    let poller = HealthPoller::new(api, health, config.health.clone());
    let server = DashboardServer::new(dashboard.clone(), &config.listener);

    tracing::debug!(api = %config.api.base_url, "Dashboard assembled");

    App {
        dashboard,
        board,
        poller,
        server,
    }
}
