//! Error-tracking integration.
//!
//! # Responsibilities
//! - Hold scope tags (trace_id, span_id, request_id) set by the API client
//! - Capture exceptions and informational messages with tags and extra data
//!
//! # Design Decisions
//! - The collaborator is a trait so the dashboard does not depend on one vendor
//! - `SentryReporter` is used when a DSN is configured; otherwise
//!   `TracingReporter` emits events through `tracing`, which reach the OTLP
//!   collector as span events when telemetry is running
//! - Scope tags are merged under per-event tags at capture time

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::ObservabilityConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// One event handed to the error-tracking collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub tags: BTreeMap<String, String>,
    pub extra: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl CapturedEvent {
    pub fn exception(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }

    pub fn message(level: Level, message: impl Into<String>) -> Self {
        Self::new(level, message)
    }

    fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            tags: BTreeMap::new(),
            extra: Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn tag(mut self, key: &str, value: impl Into<String>) -> Self {
        self.tags.insert(key.to_string(), value.into());
        self
    }

    pub fn extra(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.extra.insert(key.to_string(), value);
        self
    }
}

/// The external error-tracking collaborator.
pub trait ErrorReporter: Send + Sync {
    /// Set a tag on the shared scope; it is attached to every later event.
    fn set_tag(&self, key: &str, value: &str);

    fn capture(&self, event: CapturedEvent);

    /// Deliver queued events. Returns `false` if the timeout elapsed first.
    fn flush(&self, _timeout: Duration) -> bool {
        true
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorTrackingError {
    #[error("invalid Sentry DSN: {0}")]
    Dsn(String),
}

/// Pick the reporter for this process: Sentry when a DSN is configured,
/// structured log events otherwise.
pub fn build_reporter(config: &ObservabilityConfig) -> Arc<dyn ErrorReporter> {
    let Some(dsn) = config.sentry_dsn.as_deref() else {
        tracing::info!("No Sentry DSN configured; error-tracking events go to the log");
        return Arc::new(TracingReporter::new());
    };
    match SentryReporter::init(dsn, config) {
        Ok(reporter) => {
            tracing::info!(environment = %config.environment, "Sentry error tracking enabled");
            Arc::new(reporter)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Falling back to log-only error tracking");
            Arc::new(TracingReporter::new())
        }
    }
}

#[derive(Debug, Default)]
struct Scope {
    tags: DashMap<String, String>,
}

impl Scope {
    fn apply(&self, mut event: CapturedEvent) -> CapturedEvent {
        for entry in self.tags.iter() {
            event
                .tags
                .entry(entry.key().clone())
                .or_insert_with(|| entry.value().clone());
        }
        event
    }
}

/// Reports events as structured `tracing` events.
#[derive(Debug, Default)]
pub struct TracingReporter {
    scope: Scope,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ErrorReporter for TracingReporter {
    fn set_tag(&self, key: &str, value: &str) {
        self.scope.tags.insert(key.to_string(), value.to_string());
    }

    fn capture(&self, event: CapturedEvent) {
        let event = self.scope.apply(event);
        let tags = serde_json::to_string(&event.tags).unwrap_or_default();
        let extra = Value::Object(event.extra);
        match event.level {
            Level::Error => tracing::error!(
                target: "error_tracking",
                tags = %tags,
                extra = %extra,
                "{}",
                event.message
            ),
            Level::Warning => tracing::warn!(
                target: "error_tracking",
                tags = %tags,
                extra = %extra,
                "{}",
                event.message
            ),
            Level::Info => tracing::info!(
                target: "error_tracking",
                tags = %tags,
                extra = %extra,
                "{}",
                event.message
            ),
        }
    }
}

/// Sends events to Sentry through one shared hub.
///
/// All threads go through the same hub so that tags set by one request are
/// visible to events captured on another worker.
pub struct SentryReporter {
    hub: Arc<sentry::Hub>,
    _guard: Option<sentry::ClientInitGuard>,
}

impl SentryReporter {
    /// Install the Sentry client for the process.
    pub fn init(dsn: &str, config: &ObservabilityConfig) -> Result<Self, ErrorTrackingError> {
        let dsn: sentry::types::Dsn = dsn
            .parse()
            .map_err(|e| ErrorTrackingError::Dsn(format!("{e}")))?;
        let guard = sentry::init(sentry::ClientOptions {
            dsn: Some(dsn),
            environment: Some(config.environment.clone().into()),
            release: Some(config.service_version.clone().into()),
            ..Default::default()
        });
        Ok(Self {
            hub: sentry::Hub::main(),
            _guard: Some(guard),
        })
    }

    /// Report through an already configured hub.
    pub fn with_hub(hub: Arc<sentry::Hub>) -> Self {
        Self { hub, _guard: None }
    }
}

fn sentry_level(level: Level) -> sentry::Level {
    match level {
        Level::Info => sentry::Level::Info,
        Level::Warning => sentry::Level::Warning,
        Level::Error => sentry::Level::Error,
    }
}

impl ErrorReporter for SentryReporter {
    fn set_tag(&self, key: &str, value: &str) {
        self.hub.configure_scope(|scope| scope.set_tag(key, value));
    }

    fn capture(&self, event: CapturedEvent) {
        let Some(client) = self.hub.client() else {
            return;
        };
        // Event tags go on a private copy of the scope so they win over shared tags.
        let mut scope = self.hub.configure_scope(|scope| scope.clone());
        for (key, value) in &event.tags {
            scope.set_tag(key, value);
        }

        let mut sentry_event = sentry::protocol::Event {
            level: sentry_level(event.level),
            tags: event.tags,
            extra: event.extra.into_iter().collect(),
            timestamp: SystemTime::from(event.timestamp),
            ..Default::default()
        };
        if event.level == Level::Error {
            sentry_event.exception = vec![sentry::protocol::Exception {
                ty: "Error".to_string(),
                value: Some(event.message),
                ..Default::default()
            }]
            .into();
        } else {
            sentry_event.message = Some(event.message);
        }
        client.capture_event(sentry_event, Some(&scope));
    }

    fn flush(&self, timeout: Duration) -> bool {
        self.hub
            .client()
            .map_or(true, |client| client.flush(Some(timeout)))
    }
}

/// Keeps captured events in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingReporter {
    scope: Arc<Scope>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn scope_tag(&self, key: &str) -> Option<String> {
        self.scope.tags.get(key).map(|v| v.value().clone())
    }
}

impl ErrorReporter for RecordingReporter {
    fn set_tag(&self, key: &str, value: &str) {
        self.scope.tags.insert(key.to_string(), value.to_string());
    }

    fn capture(&self, event: CapturedEvent) {
        let event = self.scope.apply(event);
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
