//! Links into the trace viewer and the error-tracking dashboard.

use serde::Serialize;

use crate::config::LinksConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservabilityLinks {
    pub trace_viewer: String,
    pub error_tracking: String,
}

impl ObservabilityLinks {
    pub fn from_config(config: &LinksConfig) -> Self {
        Self {
            trace_viewer: config.jaeger_url.trim_end_matches('/').to_string(),
            error_tracking: config.sentry_url.trim_end_matches('/').to_string(),
        }
    }

    /// Deep link to one trace in the viewer.
    pub fn trace_url(&self, trace_id: &str) -> String {
        format!("{}/trace/{}", self.trace_viewer, trace_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_url_ignores_trailing_slash() {
        let links = ObservabilityLinks::from_config(&LinksConfig {
            jaeger_url: "http://localhost:16686/".into(),
            sentry_url: "https://sentry.io".into(),
        });
        assert_eq!(
            links.trace_url("4bf92f3577b34da6a3ce929d0e0e4736"),
            "http://localhost:16686/trace/4bf92f3577b34da6a3ce929d0e0e4736"
        );
    }
}
