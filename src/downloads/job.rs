//! Download job state machine.
//!
//! # States
//! ```text
//! Pending → Processing   initiate succeeded
//! Pending → Failed       initiate failed
//! Processing → Processing progress tick (monotone, at most 99)
//! Processing → Completed final tick (progress 100, URL set)
//! ```
//!
//! Any other transition is rejected and leaves the job untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::AbortHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {action} a {from} job")]
    InvalidState { from: JobStatus, action: &'static str },
    #[error("progress {next} is not in {current}..=99")]
    Progress { current: u8, next: u8 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadJob {
    pub id: JobId,
    pub file_id: u64,
    pub status: JobStatus,
    pub message: Option<String>,
    pub download_url: Option<String>,
    /// Seconds taken by the initiate round-trip.
    pub elapsed_time: Option<f64>,
    pub progress: Option<u8>,
    pub estimated_time_secs: Option<u64>,
    pub trace_id: Option<String>,
    pub remote_job_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DownloadJob {
    pub fn pending(file_id: u64, trace_id: Option<String>) -> Self {
        Self {
            id: JobId::new(),
            file_id,
            status: JobStatus::Pending,
            message: None,
            download_url: None,
            elapsed_time: None,
            progress: None,
            estimated_time_secs: None,
            trace_id,
            remote_job_id: None,
            created_at: Utc::now(),
        }
    }

    fn require(&self, status: JobStatus, action: &'static str) -> Result<(), TransitionError> {
        if self.status == status {
            Ok(())
        } else {
            Err(TransitionError::InvalidState {
                from: self.status,
                action,
            })
        }
    }

    pub fn begin_processing(
        &mut self,
        remote_job_id: String,
        message: String,
        elapsed_time: f64,
        estimated_time_secs: u64,
    ) -> Result<(), TransitionError> {
        self.require(JobStatus::Pending, "start processing")?;
        self.status = JobStatus::Processing;
        self.remote_job_id = Some(remote_job_id);
        self.message = Some(message);
        self.elapsed_time = Some(elapsed_time);
        self.progress = Some(0);
        self.estimated_time_secs = Some(estimated_time_secs);
        Ok(())
    }

    pub fn record_progress(&mut self, progress: u8, remaining_secs: u64) -> Result<(), TransitionError> {
        self.require(JobStatus::Processing, "advance")?;
        let current = self.progress.unwrap_or(0);
        if progress < current || progress > 99 {
            return Err(TransitionError::Progress {
                current,
                next: progress,
            });
        }
        self.progress = Some(progress);
        self.estimated_time_secs = Some(remaining_secs);
        Ok(())
    }

    pub fn complete(&mut self, download_url: String, message: String) -> Result<(), TransitionError> {
        self.require(JobStatus::Processing, "complete")?;
        self.status = JobStatus::Completed;
        self.progress = Some(100);
        self.estimated_time_secs = Some(0);
        self.download_url = Some(download_url);
        self.message = Some(message);
        Ok(())
    }

    pub fn fail(&mut self, message: String, elapsed_time: f64) -> Result<(), TransitionError> {
        self.require(JobStatus::Pending, "fail")?;
        self.status = JobStatus::Failed;
        self.message = Some(message);
        self.elapsed_time = Some(elapsed_time);
        Ok(())
    }
}

/// A job plus its insertion order and the handle of its progress timer.
#[derive(Debug)]
pub struct JobEntry {
    pub seq: u64,
    pub job: DownloadJob,
    pub timer: Option<AbortHandle>,
}

pub type JobTable = DashMap<JobId, JobEntry>;
