//! Dashboard HTTP surface.
//!
//! # Data Flow
//! ```text
//! Client (CLI, curl)
//!     → server.rs (request id, trace, timeout)
//!     → handlers.rs (widget data from Dashboard)
//!     → response.rs (typed errors → JSON status codes)
//! ```

pub mod handlers;
pub mod response;
pub mod server;

pub use response::AppError;
pub use server::{build_router, DashboardServer};
