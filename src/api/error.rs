//! Errors returned by the API client.

use serde_json::Value;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        request_id: Option<String>,
        body: Value,
    },

    /// Connect failure, timeout or an interrupted body.
    #[error("network error: {0}")]
    Network(#[source] BoxError),

    /// A 2xx response whose body did not match the expected shape.
    #[error("invalid response body: {0}")]
    Decode(#[source] BoxError),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Http { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http { .. })
    }

    /// Stable label used for metrics and the error log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http { .. } => "api_error",
            Self::Network(_) | Self::Decode(_) => "network_error",
        }
    }
}
