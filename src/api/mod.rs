//! Download API client subsystem.
//!
//! # Data Flow
//! ```text
//! Dashboard operation (inside a span)
//!     → client.rs (traceparent header, JSON body)
//!     → download API
//!     → 2xx: typed body (types.rs)
//!     → otherwise: error-tracking capture + ApiError (error.rs)
//! ```
//!
//! # Design Decisions
//! - `ApiBackend` is the seam the dashboard depends on, so widgets can be
//!   exercised against an in-process backend
//! - Every call opens its own span; the caller's span becomes its parent

pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

pub use client::{ApiClient, X_REQUEST_ID};
pub use error::ApiError;
pub use types::{DownloadCheckResponse, DownloadStartResponse, HealthCheck};

#[async_trait]
pub trait ApiBackend: Send + Sync {
    /// Base URL with no trailing slash.
    fn base_url(&self) -> &str;

    async fn get_health(&self) -> Result<HealthCheck, ApiError>;

    async fn check_download(&self, file_id: u64) -> Result<DownloadCheckResponse, ApiError>;

    async fn start_download(&self, file_id: u64) -> Result<DownloadStartResponse, ApiError>;

    /// Ask the API to fail on purpose. A success is returned as raw JSON.
    async fn test_sentry(&self, file_id: u64) -> Result<Value, ApiError>;
}
