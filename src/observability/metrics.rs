//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dashboard metrics (initiations, failures, latency, API health)
//! - Expose Prometheus-compatible metrics endpoint
//! - Keep the in-process performance summary shown by the jobs widget
//!
//! # Metrics
//! - `dashboard_downloads_initiated_total` (counter): successful initiations
//! - `dashboard_downloads_failed_total` (counter): failed initiations by kind
//! - `dashboard_initiate_duration_seconds` (histogram): initiate round-trip
//! - `dashboard_downloads_completed_total` (counter): simulated completions
//! - `dashboard_error_log_entries_total` (counter): error log appends by kind
//! - `dashboard_api_health` (gauge): 1=healthy, 0=unhealthy or unreachable

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Serialize;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_initiate_success(duration: Duration) {
    ::metrics::counter!("dashboard_downloads_initiated_total").increment(1);
    ::metrics::histogram!("dashboard_initiate_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_initiate_failure(kind: &'static str, duration: Duration) {
    ::metrics::counter!("dashboard_downloads_failed_total", "kind" => kind).increment(1);
    ::metrics::histogram!("dashboard_initiate_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_download_completed() {
    ::metrics::counter!("dashboard_downloads_completed_total").increment(1);
}

pub fn record_error_logged(kind: &'static str) {
    ::metrics::counter!("dashboard_error_log_entries_total", "kind" => kind).increment(1);
}

pub fn record_api_health(healthy: bool) {
    ::metrics::gauge!("dashboard_api_health").set(if healthy { 1.0 } else { 0.0 });
}

/// Running success/failure counts and mean initiate latency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub success_count: u64,
    pub failure_count: u64,
    /// Mean over successful initiations only.
    pub avg_response_time_ms: f64,
}

impl PerformanceMetrics {
    pub fn record_success(&mut self, response_time: Duration) {
        let sample = response_time.as_secs_f64() * 1000.0;
        let n = self.success_count as f64;
        self.avg_response_time_ms = (self.avg_response_time_ms * n + sample) / (n + 1.0);
        self.success_count += 1;
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_ignores_failures() {
        let mut m = PerformanceMetrics::default();
        m.record_success(Duration::from_millis(100));
        m.record_failure();
        m.record_success(Duration::from_millis(300));

        assert_eq!(m.success_count, 2);
        assert_eq!(m.failure_count, 1);
        assert!((m.avg_response_time_ms - 200.0).abs() < 1e-9);
    }
}
