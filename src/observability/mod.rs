//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → tracing.rs (spans, trace context, traceparent headers)
//!     → error_tracking.rs (captured exceptions with trace tags)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//!     → OTLP collector (Jaeger)
//!     → Sentry (or the log when no DSN is set)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Trace ids flow into error-tracking tags and error log entries
//! - Metrics are cheap (atomic increments)

pub mod error_tracking;
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use error_tracking::{
    build_reporter, CapturedEvent, ErrorReporter, Level, RecordingReporter, SentryReporter,
    TracingReporter,
};
pub use tracing::{
    current_trace_context, in_span, init_telemetry, shutdown_telemetry, telemetry_phase,
    tracing_headers, ActiveSpan, TelemetryPhase, TraceContext,
};
