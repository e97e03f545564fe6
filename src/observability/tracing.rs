//! Distributed tracing support.
//!
//! # Responsibilities
//! - Own the process-wide tracer provider (init once, tear down once)
//! - Wrap async operations in spans with exactly-once termination
//! - Expose the active trace context for correlation
//! - Produce W3C `traceparent` headers for outbound requests
//!
//! # Design Decisions
//! - Telemetry state is an explicit machine: Uninitialized → Running → ShutDown
//! - A tracer provider is always installed so trace ids exist for correlation;
//!   spans are exported only when an OTLP endpoint is configured
//! - Outbound headers always use the W3C trace-context format, independent of the
//!   global propagator
//! - A span parents on the active OpenTelemetry span first, then on the current
//!   `tracing` span, so request spans and dashboard spans share one trace

use std::any::Any;
use std::borrow::Cow;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt as _;
use opentelemetry::global;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::noop::NoopTracerProvider;
use opentelemetry::trace::{FutureExt as _, Status, TraceContextExt, Tracer, TracerProvider as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_http::HeaderInjector;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{self as sdktrace, RandomIdGenerator, Sampler};
use opentelemetry_sdk::Resource;
use reqwest::header::HeaderMap;
use serde::Serialize;
use tracing_opentelemetry::OpenTelemetrySpanExt as _;

use crate::config::ObservabilityConfig;
use crate::observability::logging;

/// Instrumentation scope name for spans created by this crate.
pub const TRACER_NAME: &str = "delineate-dashboard";

/// Read-only view of the active span's identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub trace_flags: u8,
}

/// Public view of the telemetry state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryPhase {
    Uninitialized,
    Running,
    ShutDown,
}

/// Result of a successful `init_telemetry` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("telemetry was already shut down and cannot be restarted")]
    AlreadyShutDown,
    #[error("failed to build OTLP exporter: {0}")]
    Exporter(String),
}

enum TelemetryState {
    Uninitialized,
    Running(sdktrace::TracerProvider),
    ShutDown,
}

static TELEMETRY: Mutex<TelemetryState> = Mutex::new(TelemetryState::Uninitialized);

fn state() -> MutexGuard<'static, TelemetryState> {
    TELEMETRY.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Initialize the tracer provider, propagator and log subscriber.
///
/// Calling this again while running is a no-op that returns `AlreadyRunning`.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<InitOutcome, TelemetryError> {
    let mut state = state();
    match *state {
        TelemetryState::Running(_) => return Ok(InitOutcome::AlreadyRunning),
        TelemetryState::ShutDown => return Err(TelemetryError::AlreadyShutDown),
        TelemetryState::Uninitialized => {}
    }

    let provider = build_provider(config)?;
    global::set_text_map_propagator(TraceContextPropagator::new());
    global::set_tracer_provider(provider.clone());

    let installed =
        logging::init_subscriber(config, Some(provider.tracer(config.service_name.clone())));

    *state = TelemetryState::Running(provider);
    drop(state);

    tracing::info!(
        otlp_endpoint = config.otlp_endpoint.as_deref().unwrap_or("disabled"),
        sampler = %config.sampler,
        environment = %config.environment,
        subscriber_installed = installed,
        "Telemetry initialized"
    );
    Ok(InitOutcome::Started)
}

/// Flush and shut down the tracer provider.
///
/// Returns `true` only for the call that actually performed the shutdown. The
/// batch exporter blocks while flushing, so async callers should run this on a
/// blocking thread.
pub fn shutdown_telemetry() -> bool {
    let mut state = state();
    match std::mem::replace(&mut *state, TelemetryState::ShutDown) {
        TelemetryState::Running(provider) => {
            drop(state);
            global::set_tracer_provider(NoopTracerProvider::new());
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "Tracer provider shutdown reported an error");
            }
            tracing::info!("Telemetry shut down");
            true
        }
        TelemetryState::Uninitialized => {
            *state = TelemetryState::Uninitialized;
            false
        }
        TelemetryState::ShutDown => false,
    }
}

/// Current phase of the process-wide telemetry state.
pub fn telemetry_phase() -> TelemetryPhase {
    match *state() {
        TelemetryState::Uninitialized => TelemetryPhase::Uninitialized,
        TelemetryState::Running(_) => TelemetryPhase::Running,
        TelemetryState::ShutDown => TelemetryPhase::ShutDown,
    }
}

fn build_provider(config: &ObservabilityConfig) -> Result<sdktrace::TracerProvider, TelemetryError> {
    let resource = Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", config.service_version.clone()),
        KeyValue::new("deployment.environment", config.environment.clone()),
    ]);

    let sampler = match config.sampler.as_str() {
        "always_off" => Sampler::AlwaysOff,
        "trace_id_ratio" => Sampler::TraceIdRatioBased(config.sample_ratio.clamp(0.0, 1.0)),
        _ => Sampler::AlwaysOn,
    };

    let mut builder = sdktrace::TracerProvider::builder()
        .with_sampler(sampler)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource);

    if let Some(endpoint) = &config.otlp_endpoint {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint.clone())
            .build()
            .map_err(|e| TelemetryError::Exporter(e.to_string()))?;
        builder = builder.with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio);
    }

    Ok(builder.build())
}

/// A started span that is ended exactly once.
///
/// `run` ends it with the operation's outcome; dropping it unfinished ends it
/// with an error status of `cancelled`.
pub struct ActiveSpan {
    cx: Option<Context>,
}

impl ActiveSpan {
    /// Start a span on `tracer` as a child of the current context.
    pub fn start<T>(tracer: &T, name: impl Into<Cow<'static, str>>, attributes: Vec<KeyValue>) -> Self
    where
        T: Tracer,
        T::Span: Send + Sync + 'static,
    {
        let parent = parent_context();
        let span = tracer
            .span_builder(name)
            .with_attributes(attributes)
            .start_with_context(tracer, &parent);
        Self {
            cx: Some(parent.with_span(span)),
        }
    }

    /// Start a span on the global tracer.
    pub fn start_global(name: impl Into<Cow<'static, str>>, attributes: Vec<KeyValue>) -> Self {
        Self::start(&global::tracer(TRACER_NAME), name, attributes)
    }

    /// Context carrying this span.
    pub fn context(&self) -> Context {
        self.cx.clone().unwrap_or_default()
    }

    pub fn trace_context(&self) -> Option<TraceContext> {
        self.cx.as_ref().and_then(trace_context_of)
    }

    /// Run `op` inside this span and end the span with its outcome.
    ///
    /// A panic, whether raised while building the future or while polling it, is
    /// recorded as an exception and then resumed.
    pub async fn run<F, Fut, T, E>(mut self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        let cx = self.context();

        let fut = match panic::catch_unwind(AssertUnwindSafe(|| {
            let _attached = cx.clone().attach();
            op()
        })) {
            Ok(fut) => fut,
            Err(payload) => {
                self.finish_panicked(payload.as_ref());
                panic::resume_unwind(payload)
            }
        };

        match AssertUnwindSafe(fut.with_context(cx)).catch_unwind().await {
            Ok(Ok(value)) => {
                self.finish(Status::Ok);
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Some(cx) = &self.cx {
                    cx.span().record_error(&err);
                }
                self.finish(Status::error(err.to_string()));
                Err(err)
            }
            Err(payload) => {
                self.finish_panicked(payload.as_ref());
                panic::resume_unwind(payload)
            }
        }
    }

    fn finish_panicked(&mut self, payload: &(dyn Any + Send)) {
        let message = panic_message(payload);
        if let Some(cx) = &self.cx {
            cx.span().add_event(
                "exception",
                vec![
                    KeyValue::new("exception.type", "panic"),
                    KeyValue::new("exception.message", message.clone()),
                ],
            );
        }
        self.finish(Status::error(message));
    }

    fn finish(&mut self, status: Status) {
        if let Some(cx) = self.cx.take() {
            let span = cx.span();
            span.set_status(status);
            span.end();
        }
    }
}

impl Drop for ActiveSpan {
    fn drop(&mut self) {
        self.finish(Status::error("cancelled"));
    }
}

/// The active OpenTelemetry context, or the one behind the current `tracing`
/// span when no OpenTelemetry span is attached.
fn parent_context() -> Context {
    let current = Context::current();
    if current.span().span_context().is_valid() {
        return current;
    }
    let bridged = tracing::Span::current().context();
    if bridged.span().span_context().is_valid() {
        bridged
    } else {
        current
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

/// Run `op` inside a new span on the global tracer.
pub async fn in_span<F, Fut, T, E>(
    name: impl Into<Cow<'static, str>>,
    attributes: Vec<KeyValue>,
    op: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error,
{
    ActiveSpan::start_global(name, attributes).run(op).await
}

/// Trace context of the span active on the current task, if it is valid.
pub fn current_trace_context() -> Option<TraceContext> {
    trace_context_of(&Context::current())
}

pub fn trace_context_of(cx: &Context) -> Option<TraceContext> {
    let span = cx.span();
    let span_context = span.span_context();
    if !span_context.is_valid() {
        return None;
    }
    Some(TraceContext {
        trace_id: span_context.trace_id().to_string(),
        span_id: span_context.span_id().to_string(),
        trace_flags: span_context.trace_flags().to_u8(),
    })
}

/// Propagation headers for the current context.
pub fn tracing_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    inject_context(&Context::current(), &mut headers);
    headers
}

/// Write `traceparent` (and `tracestate` when non-empty) for `cx` into `headers`.
pub fn inject_context(cx: &Context, headers: &mut HeaderMap) {
    TraceContextPropagator::new().inject_context(cx, &mut HeaderInjector(headers));
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};
    use opentelemetry_sdk::export::trace::SpanData;
    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
    use std::io;
    use std::time::Duration;

    fn test_tracer() -> (sdktrace::TracerProvider, sdktrace::Tracer, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = sdktrace::TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let tracer = provider.tracer("test");
        (provider, tracer, exporter)
    }

    fn finished(exporter: &InMemorySpanExporter) -> Vec<SpanData> {
        exporter.get_finished_spans().unwrap()
    }

    fn error_description(status: &Status) -> Option<String> {
        match status {
            Status::Error { description } => Some(description.to_string()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_ok_ends_span_once_with_ok_status() {
        let (_provider, tracer, exporter) = test_tracer();

        let result: Result<u32, io::Error> = ActiveSpan::start(&tracer, "op.ok", vec![])
            .run(|| async { Ok(7) })
            .await;

        assert_eq!(result.unwrap(), 7);
        let spans = finished(&exporter);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "op.ok");
        assert_eq!(spans[0].status, Status::Ok);
    }

    #[tokio::test]
    async fn test_error_records_exception_and_error_status() {
        let (_provider, tracer, exporter) = test_tracer();

        let result: Result<(), io::Error> = ActiveSpan::start(&tracer, "op.err", vec![])
            .run(|| async { Err(io::Error::new(io::ErrorKind::Other, "boom")) })
            .await;

        assert!(result.is_err());
        let spans = finished(&exporter);
        assert_eq!(spans.len(), 1);
        assert_eq!(error_description(&spans[0].status).as_deref(), Some("boom"));
        assert!(spans[0].events.iter().any(|e| e.name == "exception"));
    }

    #[tokio::test]
    async fn test_panic_while_building_future_is_recorded() {
        let (_provider, tracer, exporter) = test_tracer();
        let span = ActiveSpan::start(&tracer, "op.sync_panic", vec![]);

        let outcome = AssertUnwindSafe(span.run(|| -> std::future::Ready<Result<(), io::Error>> {
            panic!("thrown before await")
        }))
        .catch_unwind()
        .await;

        assert!(outcome.is_err());
        let spans = finished(&exporter);
        assert_eq!(spans.len(), 1);
        assert_eq!(
            error_description(&spans[0].status).as_deref(),
            Some("thrown before await")
        );
    }

    #[tokio::test]
    async fn test_panic_while_polling_is_recorded() {
        let (_provider, tracer, exporter) = test_tracer();
        let span = ActiveSpan::start(&tracer, "op.async_panic", vec![]);

        let outcome = AssertUnwindSafe(span.run(|| async {
            tokio::task::yield_now().await;
            if true {
                panic!("rejected");
            }
            Ok::<(), io::Error>(())
        }))
        .catch_unwind()
        .await;

        assert!(outcome.is_err());
        let spans = finished(&exporter);
        assert_eq!(spans.len(), 1);
        assert_eq!(error_description(&spans[0].status).as_deref(), Some("rejected"));
    }

    #[tokio::test]
    async fn test_dropped_operation_ends_span_as_cancelled() {
        let (_provider, tracer, exporter) = test_tracer();

        let span = ActiveSpan::start(&tracer, "op.cancelled", vec![]);
        let timed_out = tokio::time::timeout(
            Duration::from_millis(10),
            span.run(|| std::future::pending::<Result<(), io::Error>>()),
        )
        .await;
        assert!(timed_out.is_err());

        drop(ActiveSpan::start(&tracer, "op.never_run", vec![]));

        let spans = finished(&exporter);
        assert_eq!(spans.len(), 2);
        for span in &spans {
            assert_eq!(error_description(&span.status).as_deref(), Some("cancelled"));
        }
    }

    #[tokio::test]
    async fn test_nested_span_shares_trace_and_sees_context() {
        let (_provider, tracer, exporter) = test_tracer();
        let outer = ActiveSpan::start(&tracer, "outer", vec![]);
        let outer_ctx = outer.trace_context().unwrap();

        let inner_tracer = tracer.clone();
        let seen = outer
            .run(|| async move {
                let inner = ActiveSpan::start(&inner_tracer, "inner", vec![]);
                inner
                    .run(|| async { Ok::<_, io::Error>(current_trace_context()) })
                    .await
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(seen.trace_id, outer_ctx.trace_id);
        assert_ne!(seen.span_id, outer_ctx.span_id);
        assert_eq!(finished(&exporter).len(), 2);
    }

    #[tokio::test]
    async fn test_span_joins_trace_of_enclosing_tracing_span() {
        use tracing::Instrument as _;
        use tracing_opentelemetry::OpenTelemetrySpanExt as _;
        use tracing_subscriber::layer::SubscriberExt as _;

        let (_provider, tracer, exporter) = test_tracer();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(tracer.clone()));
        let _default = tracing::subscriber::set_default(subscriber);

        let request = tracing::info_span!("request");
        let request_cx = request.context();
        let request_span = request_cx.span().span_context().clone();
        assert!(request_span.is_valid());

        let seen = async {
            ActiveSpan::start(&tracer, "dashboard.initiate_download", vec![])
                .run(|| async { Ok::<_, io::Error>(current_trace_context()) })
                .await
        }
        .instrument(request.clone())
        .await
        .unwrap()
        .unwrap();

        assert_eq!(seen.trace_id, request_span.trace_id().to_string());
        assert_ne!(seen.span_id, request_span.span_id().to_string());

        let spans = finished(&exporter);
        let dashboard = spans
            .iter()
            .find(|s| s.name == "dashboard.initiate_download")
            .unwrap();
        assert_eq!(dashboard.parent_span_id, request_span.span_id());
    }

    #[test]
    fn test_inject_writes_w3c_traceparent() {
        let span_context = SpanContext::new(
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
            SpanId::from_hex("00f067aa0ba902b7").unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let cx = Context::new().with_remote_span_context(span_context);

        let mut headers = HeaderMap::new();
        inject_context(&cx, &mut headers);

        assert_eq!(
            headers.get("traceparent").unwrap(),
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
        );
        let view = trace_context_of(&cx).unwrap();
        assert_eq!(view.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(view.span_id, "00f067aa0ba902b7");
        assert_eq!(view.trace_flags, 1);
    }

    #[test]
    fn test_no_active_span_means_no_context_or_header() {
        assert!(trace_context_of(&Context::new()).is_none());
        let mut headers = HeaderMap::new();
        inject_context(&Context::new(), &mut headers);
        assert!(headers.get("traceparent").is_none());
    }
}
