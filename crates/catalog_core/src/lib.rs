//! Core data-access layer for the catalog service.
//! This crate is the single source of truth for entity invariants: category
//! path hierarchy, capped streaming queries and storage error translation.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod manager;
pub mod model;
pub mod repo;
pub mod stream;

pub use app::{BootstrapError, Catalog, StopError};
pub use config::{Config, ConfigError, DbConfig, LoggerConfig, SeedConfig};
pub use db::{Client, DbError, Deadline};
pub use error::{RepoError, RepoResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use manager::{ManagerError, TraceId};
pub use model::{Building, Category, CategoryPath, Company, ValidationError};
pub use stream::{Limit, QueryOutcome, StreamError, TimeRange, MAX_LIMIT};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
