//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep the command line layer decoupled from storage details.
//! - Host pure computations (consumption, recurrence, summaries) next to
//!   the services that feed them.

pub mod consumption;
pub mod document_service;
pub mod maintenance_service;
pub mod meter_service;
pub mod order_service;
pub mod quote_service;
pub mod task_service;
