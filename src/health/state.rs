//! Displayed API health.
//!
//! # States
//! ```text
//! Loading → Ready | Failed      first poll settled
//! Ready | Failed → Ready | Failed  every later poll
//! ```
//!
//! # Design Decisions
//! - The view is replaced wholesale on every poll; no history is kept
//! - Readers never block the poller (lock-free swap)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::HealthCheck;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HealthView {
    Loading,
    Ready {
        check: HealthCheck,
        checked_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        checked_at: DateTime<Utc>,
    },
}

impl HealthView {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Ready { check, .. } if check.is_healthy())
    }
}

#[derive(Debug)]
pub struct HealthStore {
    view: ArcSwap<HealthView>,
    polls: AtomicU64,
}

impl HealthStore {
    pub fn new() -> Self {
        Self {
            view: ArcSwap::from_pointee(HealthView::Loading),
            polls: AtomicU64::new(0),
        }
    }

    pub fn current(&self) -> Arc<HealthView> {
        self.view.load_full()
    }

    pub fn replace(&self, view: HealthView) {
        self.view.store(Arc::new(view));
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of completed polls.
    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }
}

impl Default for HealthStore {
    fn default() -> Self {
        Self::new()
    }
}
