//! API health subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (poller.rs)
//!     → GET /health through the traced client
//!     → Replace view in state.rs
//!
//! Readers (dashboard snapshot, HTTP handlers)
//!     → state.rs (latest view only)
//! ```
//!
//! # Design Decisions
//! - No retry backoff and no jitter; the next tick is the retry
//! - A failed poll replaces the view like any other result

pub mod poller;
pub mod state;

pub use poller::HealthPoller;
pub use state::{HealthStore, HealthView};
