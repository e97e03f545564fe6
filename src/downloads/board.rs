//! Download jobs widget state.
//!
//! # Responsibilities
//! - Validate file ids and create jobs newest first
//! - Issue the initiate call inside a span and apply its outcome to the job
//! - Own the simulator timers, the error log, performance metrics and the
//!   latest error-tracking probe
//!
//! # Design Decisions
//! - Request failures are values, not errors: the job shows `failed`
//! - Validation failures return early and are never reported
//! - Locks are never held across an await

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::api::{ApiBackend, ApiError, DownloadCheckResponse, DownloadStartResponse};
use crate::config::DownloadConfig;
use crate::downloads::error_log::{ErrorEntry, ErrorKind, ErrorLog};
use crate::downloads::job::{DownloadJob, JobEntry, JobId, JobTable};
use crate::downloads::simulator::{spawn_simulation, ProgressPlan};
use crate::downloads::validation::{FileIdError, FileIdRange};
use crate::observability::error_tracking::{CapturedEvent, ErrorReporter, Level};
use crate::observability::metrics::{self, PerformanceMetrics};
use crate::observability::tracing::{ActiveSpan, TraceContext};

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error(transparent)]
    InvalidFileId(#[from] FileIdError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Latest result of the deliberate-failure probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub request_id: String,
    pub status: u16,
    pub message: String,
    pub response_time_ms: f64,
    pub trace_id: Option<String>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Captured(ProbeResult),
    /// The API answered 2xx although it was asked to fail.
    NotTriggered { response: Value },
}

pub struct JobBoard {
    api: Arc<dyn ApiBackend>,
    reporter: Arc<dyn ErrorReporter>,
    range: FileIdRange,
    plan: ProgressPlan,
    banner_ttl: Duration,
    probe_file_id: u64,
    jobs: Arc<JobTable>,
    next_seq: AtomicU64,
    errors: Mutex<ErrorLog>,
    performance: Mutex<PerformanceMetrics>,
    probe: Mutex<Option<(ProbeResult, Instant)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JobBoard {
    pub fn new(
        api: Arc<dyn ApiBackend>,
        reporter: Arc<dyn ErrorReporter>,
        config: &DownloadConfig,
    ) -> Self {
        Self {
            api,
            reporter,
            range: FileIdRange::from_config(config),
            plan: ProgressPlan::from_config(config),
            banner_ttl: Duration::from_secs(config.banner_ttl_secs),
            probe_file_id: config.probe_file_id,
            jobs: Arc::new(JobTable::new()),
            next_seq: AtomicU64::new(0),
            errors: Mutex::new(ErrorLog::new(config.error_log_capacity)),
            performance: Mutex::new(PerformanceMetrics::default()),
            probe: Mutex::new(None),
        }
    }

    /// Validate `raw`, create a job and initiate it.
    ///
    /// Returns the job as it stands once the initiate call has settled:
    /// `processing` on success, `failed` otherwise.
    pub async fn start_download(&self, raw: &str) -> Result<DownloadJob, FileIdError> {
        let file_id = self.range.validate(raw)?;

        let span = ActiveSpan::start_global(
            "dashboard.initiate_download",
            vec![KeyValue::new("file.id", file_id as i64)],
        );
        let trace = span.trace_context();
        let trace_id = trace.as_ref().map(|t| t.trace_id.clone());

        let pending = DownloadJob::pending(file_id, trace_id.clone());
        let id = pending.id;
        self.jobs.insert(
            id,
            JobEntry {
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                job: pending.clone(),
                timer: None,
            },
        );
        tracing::info!(job_id = %id, file_id, "Download job created");

        let started = Instant::now();
        let api = &self.api;
        let result = span.run(|| api.start_download(file_id)).await;
        let elapsed = started.elapsed();

        let settled = match result {
            Ok(response) => self.on_initiated(id, response, elapsed, trace.as_ref()),
            Err(err) => self.on_initiate_failed(id, &err, elapsed, trace_id),
        };
        Ok(settled.unwrap_or(pending))
    }

    fn on_initiated(
        &self,
        id: JobId,
        response: DownloadStartResponse,
        elapsed: Duration,
        trace: Option<&TraceContext>,
    ) -> Option<DownloadJob> {
        lock(&self.performance).record_success(elapsed);
        metrics::record_initiate_success(elapsed);

        let message = format!(
            "Job initiated successfully | Job ID: {} | Files: {}",
            response.job_id, response.total_file_ids
        );

        let mut entry = self.jobs.get_mut(&id)?;
        let file_id = entry.job.file_id;
        let estimated = self.plan.total().as_secs_f64().round() as u64;
        match entry.job.begin_processing(
            response.job_id.clone(),
            message,
            elapsed.as_secs_f64(),
            estimated,
        ) {
            Ok(()) => {
                let url = format!("{}/downloads/{}.zip", self.api.base_url(), file_id);
                let handle = spawn_simulation(self.jobs.clone(), id, self.plan, url);
                entry.timer = Some(handle.abort_handle());
            }
            Err(e) => tracing::warn!(job_id = %id, error = %e, "Initiate result rejected"),
        }
        let job = entry.job.clone();
        drop(entry);

        tracing::info!(
            job_id = %id,
            remote_job_id = %response.job_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "Download job initiated"
        );

        let mut event = CapturedEvent::message(Level::Info, "Download job initiated")
            .extra("job_id", &response.job_id)
            .extra("file_id", file_id);
        if let Some(trace) = trace {
            event = event
                .tag("trace_id", trace.trace_id.clone())
                .tag("span_id", trace.span_id.clone());
        }
        self.reporter.capture(event);

        Some(job)
    }

    fn on_initiate_failed(
        &self,
        id: JobId,
        err: &ApiError,
        elapsed: Duration,
        trace_id: Option<String>,
    ) -> Option<DownloadJob> {
        lock(&self.performance).record_failure();
        metrics::record_initiate_failure(err.kind(), elapsed);

        let message = err.to_string();
        tracing::warn!(job_id = %id, error = %message, "Download initiation failed");

        let job = self.jobs.get_mut(&id).map(|mut entry| {
            if let Err(e) = entry.job.fail(message.clone(), elapsed.as_secs_f64()) {
                tracing::warn!(job_id = %id, error = %e, "Failure result rejected");
            }
            entry.job.clone()
        });

        self.log_error(
            ErrorEntry::new(ErrorKind::from(err), message)
                .with_trace_id(trace_id)
                .with_status(err.status()),
        );
        job
    }

    /// Ask the API whether a file is available.
    pub async fn check_download(&self, raw: &str) -> Result<DownloadCheckResponse, BoardError> {
        let file_id = self.range.validate(raw)?;

        let span = ActiveSpan::start_global(
            "dashboard.check_download",
            vec![KeyValue::new("file.id", file_id as i64)],
        );
        let trace_id = span.trace_context().map(|t| t.trace_id);
        let api = &self.api;

        match span.run(|| api.check_download(file_id)).await {
            Ok(response) => Ok(response),
            Err(err) => {
                self.log_error(
                    ErrorEntry::new(ErrorKind::from(&err), err.to_string())
                        .with_trace_id(trace_id)
                        .with_status(err.status()),
                );
                Err(err.into())
            }
        }
    }

    /// Trigger the API's deliberate failure and record it.
    pub async fn test_error_tracking(&self) -> ProbeOutcome {
        let span = ActiveSpan::start_global("dashboard.test_error_tracking", vec![]);
        let trace_id = span.trace_context().map(|t| t.trace_id);

        let started = Instant::now();
        let api = &self.api;
        let file_id = self.probe_file_id;
        let result = span.run(|| api.test_sentry(file_id)).await;
        let elapsed = started.elapsed();

        let err = match result {
            Ok(response) => {
                tracing::warn!("Error-tracking probe was not triggered");
                return ProbeOutcome::NotTriggered { response };
            }
            Err(err) => err,
        };

        let status = err.status().unwrap_or(500);
        let message = format!("Sentry Test: {err}");
        let probe = ProbeResult {
            request_id: err.request_id().unwrap_or("N/A").to_string(),
            status,
            message: message.clone(),
            response_time_ms: elapsed.as_secs_f64() * 1000.0,
            trace_id: trace_id.clone(),
            captured_at: Utc::now(),
        };

        lock(&self.performance).record_failure();
        self.log_error(
            ErrorEntry::new(ErrorKind::SentryTest, message)
                .with_trace_id(trace_id)
                .with_status(Some(status)),
        );
        *lock(&self.probe) = Some((probe.clone(), Instant::now()));

        tracing::info!(
            request_id = %probe.request_id,
            status,
            "Error-tracking probe captured"
        );
        ProbeOutcome::Captured(probe)
    }

    fn log_error(&self, entry: ErrorEntry) {
        metrics::record_error_logged(entry.kind.as_str());
        lock(&self.errors).push(entry);
    }

    /// All jobs, newest first.
    pub fn jobs(&self) -> Vec<DownloadJob> {
        let mut entries: Vec<(u64, DownloadJob)> = self
            .jobs
            .iter()
            .map(|e| (e.seq, e.job.clone()))
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        entries.into_iter().map(|(_, job)| job).collect()
    }

    pub fn job(&self, id: JobId) -> Option<DownloadJob> {
        self.jobs.get(&id).map(|e| e.job.clone())
    }

    pub fn errors(&self) -> Vec<ErrorEntry> {
        lock(&self.errors).entries()
    }

    pub fn performance(&self) -> PerformanceMetrics {
        *lock(&self.performance)
    }

    /// The latest probe result while it is still within its display window.
    pub fn latest_probe(&self) -> Option<ProbeResult> {
        lock(&self.probe)
            .as_ref()
            .filter(|(_, at)| at.elapsed() < self.banner_ttl)
            .map(|(probe, _)| probe.clone())
    }

    /// Number of jobs whose simulator timer is still registered.
    pub fn active_timers(&self) -> usize {
        self.jobs.iter().filter(|e| e.timer.is_some()).count()
    }

    /// Abort every outstanding simulator timer.
    pub fn shutdown(&self) -> usize {
        let mut aborted = 0;
        for mut entry in self.jobs.iter_mut() {
            if let Some(timer) = entry.timer.take() {
                timer.abort();
                aborted += 1;
            }
        }
        if aborted > 0 {
            tracing::info!(aborted, "Aborted download simulators");
        }
        aborted
    }
}

impl Drop for JobBoard {
    fn drop(&mut self) {
        self.shutdown();
    }
}
