//! Local progress simulation for initiated jobs.
//!
//! # Design Decisions
//! - A fixed number of ticks at a fixed interval; the first tick fires one
//!   interval after initiation
//! - Intermediate ticks cap progress at 99 so only completion reports 100
//! - The table entry is never held across an await

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::DownloadConfig;
use crate::downloads::job::{JobId, JobTable};
use crate::observability::metrics;

pub const COMPLETED_MESSAGE: &str = "Download completed successfully! File is ready.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressPlan {
    pub ticks: u32,
    pub interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Advance { progress: u8, remaining_secs: u64 },
    Complete,
}

impl ProgressPlan {
    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            ticks: config.progress_ticks,
            interval: Duration::from_millis(config.tick_interval_ms),
        }
    }

    /// What tick `tick` (1-based) does to the job.
    pub fn step(&self, tick: u32) -> Step {
        if tick >= self.ticks {
            return Step::Complete;
        }
        let percent = (f64::from(tick) / f64::from(self.ticks) * 100.0).round();
        let remaining = self.interval * (self.ticks - tick);
        Step::Advance {
            progress: (percent as u8).min(99),
            remaining_secs: remaining.as_secs_f64().round() as u64,
        }
    }

    pub fn total(&self) -> Duration {
        self.interval * self.ticks
    }
}

/// Drive job `id` through `plan`, completing it with `download_url`.
///
/// Stops early if the job disappears or rejects a transition.
pub fn spawn_simulation(
    jobs: Arc<JobTable>,
    id: JobId,
    plan: ProgressPlan,
    download_url: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + plan.interval, plan.interval);

        for tick in 1..=plan.ticks {
            ticker.tick().await;

            let Some(mut entry) = jobs.get_mut(&id) else {
                return;
            };

            match plan.step(tick) {
                Step::Advance {
                    progress,
                    remaining_secs,
                } => {
                    if let Err(e) = entry.job.record_progress(progress, remaining_secs) {
                        tracing::warn!(job_id = %id, error = %e, "Progress tick rejected");
                        entry.timer = None;
                        return;
                    }
                    tracing::debug!(job_id = %id, progress, remaining_secs, "Download progress");
                }
                Step::Complete => {
                    match entry.job.complete(download_url, COMPLETED_MESSAGE.to_string()) {
                        Ok(()) => {
                            metrics::record_download_completed();
                            tracing::info!(
                                job_id = %id,
                                file_id = entry.job.file_id,
                                "Download completed"
                            );
                        }
                        Err(e) => {
                            tracing::warn!(job_id = %id, error = %e, "Completion rejected");
                        }
                    }
                    entry.timer = None;
                    return;
                }
            }
        }
    })
}
