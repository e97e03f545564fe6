//! Observability demo dashboard library

pub mod api;
pub mod config;
pub mod dashboard;
pub mod downloads;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::DashboardConfig;
pub use dashboard::Dashboard;
pub use http::DashboardServer;
pub use lifecycle::Shutdown;
