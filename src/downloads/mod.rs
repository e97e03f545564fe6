//! Download jobs subsystem.
//!
//! # Data Flow
//! ```text
//! User input
//!     → validation.rs (file id range, no network on failure)
//!     → board.rs (pending job, initiate inside a span)
//!     → job.rs (pending → processing | failed)
//!     → simulator.rs (timed ticks → completed)
//!
//! Request failures:
//!     → error_log.rs (newest first, capped)
//!     → error tracking (via the API client)
//! ```
//!
//! # Design Decisions
//! - Progress is simulated locally; the API is asked only once per job
//! - Each job owns at most one timer, cleared on completion

pub mod board;
pub mod error_log;
pub mod job;
pub mod simulator;
pub mod validation;

pub use board::{BoardError, JobBoard, ProbeOutcome, ProbeResult};
pub use error_log::{ErrorEntry, ErrorKind, ErrorLog, MAX_ERROR_LOG_ENTRIES};
pub use job::{DownloadJob, JobId, JobStatus, TransitionError};
pub use simulator::{ProgressPlan, COMPLETED_MESSAGE};
pub use validation::{FileIdError, FileIdInput, FileIdRange};
