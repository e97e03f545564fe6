//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (API URL, UI links, OTLP endpoint)
//!     → validation.rs (semantic checks)
//!     → DashboardConfig (validated, immutable)
//!     → cloned sections handed to each subsystem
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_with_env, ConfigError};
pub use schema::{
    ApiConfig, DashboardConfig, DownloadConfig, HealthConfig, LinksConfig, ListenerConfig,
    ObservabilityConfig,
};
