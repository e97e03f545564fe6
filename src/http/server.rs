//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the dashboard handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve until the shutdown broadcast fires

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ListenerConfig;
use crate::dashboard::Dashboard;
use crate::http::handlers;

/// JSON surface of the dashboard.
pub struct DashboardServer {
    router: Router,
}

impl DashboardServer {
    pub fn new(dashboard: Arc<Dashboard>, config: &ListenerConfig) -> Self {
        Self {
            router: build_router(dashboard, Duration::from_secs(config.request_timeout_secs)),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Dashboard server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Dashboard server received shutdown signal");
            })
            .await?;

        tracing::info!("Dashboard server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(dashboard: Arc<Dashboard>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/api/dashboard", get(handlers::get_dashboard))
        .route("/api/health", get(handlers::get_health))
        .route("/api/jobs", get(handlers::get_jobs).post(handlers::create_job))
        .route("/api/jobs/{id}", get(handlers::get_job))
        .route("/api/errors", get(handlers::get_errors))
        .route("/api/downloads/check", post(handlers::check_download))
        .route("/api/error-tracking/test", post(handlers::test_error_tracking))
        .route("/api/links", get(handlers::get_links))
        .route("/api/status", get(handlers::get_status))
        .with_state(dashboard)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
