//! Periodic API health polling.
//!
//! # Responsibilities
//! - Poll `GET /health` immediately and then every `interval_secs`
//! - Replace the health view with the latest result

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::api::ApiBackend;
use crate::config::HealthConfig;
use crate::health::state::{HealthStore, HealthView};
use crate::observability::metrics;

pub struct HealthPoller {
    api: Arc<dyn ApiBackend>,
    store: Arc<HealthStore>,
    config: HealthConfig,
}

impl HealthPoller {
    pub fn new(api: Arc<dyn ApiBackend>, store: Arc<HealthStore>, config: HealthConfig) -> Self {
        Self { api, store, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Health polling disabled");
            return;
        }

        tracing::info!(interval = self.config.interval_secs, "Health poller starting");

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health poller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub async fn poll_once(&self) -> Arc<HealthView> {
        let view = match self.api.get_health().await {
            Ok(check) => {
                if !check.is_healthy() {
                    tracing::warn!(storage = ?check.checks.storage, "API reports unhealthy");
                }
                metrics::record_api_health(check.is_healthy());
                HealthView::Ready {
                    check,
                    checked_at: Utc::now(),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Health check failed");
                metrics::record_api_health(false);
                HealthView::Failed {
                    error: e.to_string(),
                    checked_at: Utc::now(),
                }
            }
        };

        self.store.replace(view);
        self.store.current()
    }
}
