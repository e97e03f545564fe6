//! Dashboard composition.
//!
//! # Responsibilities
//! - Tie the health view, the job board and the observability links together
//! - Produce the snapshot each widget renders from
//!
//! # Data Flow
//! ```text
//! health::HealthStore ─┐
//! downloads::JobBoard ─┼→ Dashboard::snapshot() → HTTP handlers / CLI
//! links.rs ────────────┘
//! ```

pub mod links;

use std::sync::Arc;

use serde::Serialize;

use crate::downloads::{DownloadJob, ErrorEntry, JobBoard, ProbeResult};
use crate::health::{HealthStore, HealthView};
use crate::observability::metrics::PerformanceMetrics;
use crate::observability::tracing::{telemetry_phase, TelemetryPhase};

pub use links::ObservabilityLinks;

/// A job plus the link to its trace.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: DownloadJob,
    pub trace_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub health: HealthView,
    pub jobs: Vec<JobView>,
    pub errors: Vec<ErrorEntry>,
    pub performance: PerformanceMetrics,
    pub probe: Option<ProbeResult>,
    pub links: ObservabilityLinks,
    pub telemetry: TelemetryPhase,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub version: String,
    pub environment: String,
    pub api_base_url: String,
    pub telemetry: TelemetryPhase,
    pub active_simulations: usize,
}

pub struct Dashboard {
    board: Arc<JobBoard>,
    health: Arc<HealthStore>,
    links: ObservabilityLinks,
    api_base_url: String,
    version: String,
    environment: String,
}

impl Dashboard {
    pub fn new(
        board: Arc<JobBoard>,
        health: Arc<HealthStore>,
        links: ObservabilityLinks,
        api_base_url: String,
        version: String,
        environment: String,
    ) -> Self {
        Self {
            board,
            health,
            links,
            api_base_url,
            version,
            environment,
        }
    }

    pub fn board(&self) -> &JobBoard {
        &self.board
    }

    pub fn health(&self) -> HealthView {
        self.health.current().as_ref().clone()
    }

    pub fn links(&self) -> &ObservabilityLinks {
        &self.links
    }

    pub fn job_view(&self, job: DownloadJob) -> JobView {
        let trace_url = job.trace_id.as_deref().map(|id| self.links.trace_url(id));
        JobView { job, trace_url }
    }

    pub fn jobs(&self) -> Vec<JobView> {
        self.board
            .jobs()
            .into_iter()
            .map(|job| self.job_view(job))
            .collect()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            health: self.health(),
            jobs: self.jobs(),
            errors: self.board.errors(),
            performance: self.board.performance(),
            probe: self.board.latest_probe(),
            links: self.links.clone(),
            telemetry: telemetry_phase(),
        }
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            version: self.version.clone(),
            environment: self.environment.clone(),
            api_base_url: self.api_base_url.clone(),
            telemetry: telemetry_phase(),
            active_simulations: self.board.active_timers(),
        }
    }
}
