//! Domain model for every record-keeping module.
//!
//! # Responsibility
//! - Define the canonical records of each store and their validation rules.
//! - Keep money and date helpers shared by all modules.
//!
//! # Invariants
//! - Records are validated before any write path touches SQL.
//! - Money is held as integer cents, never as floating point.

pub mod document;
pub mod maintenance;
pub mod meter;
pub mod money;
pub mod order;
pub mod quote;
pub mod task;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Row identifier assigned by SQLite.
pub type RecordId = i64;

/// A field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid `{}`: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}

pub(crate) fn require_non_blank(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be blank"));
    }
    Ok(())
}

pub(crate) fn require_non_negative(field: &'static str, value: i64) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::new(
            field,
            format!("must not be negative, got {value}"),
        ));
    }
    Ok(())
}
