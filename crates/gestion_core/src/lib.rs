//! Core domain logic for the `gestion` registers: purchase orders, quotes,
//! utility meters, maintenance, document library and tasks.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError, ConfigOverrides};
pub use db::{open_db, open_db_in_memory, open_store, DbError, Store};
pub use export::{ExportError, Tabular};
pub use logging::{
    default_log_level, init_from_config, init_logging, logging_status, LogLevel, LoggingError,
};
pub use model::{RecordId, ValidationError};
pub use repo::{RepoError, RepoResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
