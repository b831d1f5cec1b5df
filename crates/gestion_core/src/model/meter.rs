//! Utility meter (Compteur) model: category tree, meters and index readings.
//!
//! # Invariants
//! - Categories form a forest; a category never becomes its own ancestor.
//! - A meter belongs to exactly one category and measures in one unit.
//! - Readings are cumulative indices, at most one per meter and date.

use super::{require_non_blank, RecordId, ValidationError};
use crate::export::Tabular;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Node of the variable-depth category hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Option<RecordId>,
    pub name: String,
    /// `None` for top-level categories.
    pub parent_id: Option<RecordId>,
}

impl Category {
    pub fn new(name: impl Into<String>, parent_id: Option<RecordId>) -> Self {
        Self {
            id: None,
            name: name.into(),
            parent_id,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("name", &self.name)?;
        if self.name.contains('/') {
            return Err(ValidationError::new(
                "name",
                "category names cannot contain `/`",
            ));
        }
        Ok(())
    }
}

/// Category with its resolved children, used for tree listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meter {
    pub id: Option<RecordId>,
    pub name: String,
    pub category_id: RecordId,
    /// Measurement unit, e.g. `m3` or `kWh`.
    pub unit: String,
    pub active: bool,
    pub notes: String,
}

impl Meter {
    pub fn new(name: impl Into<String>, category_id: RecordId, unit: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            category_id,
            unit: unit.into(),
            active: true,
            notes: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("name", &self.name)?;
        require_non_blank("unit", &self.unit)?;
        Ok(())
    }
}

/// One cumulative index read off a meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: Option<RecordId>,
    pub meter_id: RecordId,
    pub date: NaiveDate,
    pub index_value: f64,
    pub comment: String,
}

impl Reading {
    pub fn new(meter_id: RecordId, date: NaiveDate, index_value: f64) -> Self {
        Self {
            id: None,
            meter_id,
            date,
            index_value,
            comment: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.index_value.is_finite() {
            return Err(ValidationError::new("index", "must be a finite number"));
        }
        if self.index_value < 0.0 {
            return Err(ValidationError::new(
                "index",
                format!("must not be negative, got {}", self.index_value),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadingExportRow {
    pub meter_id: RecordId,
    pub date: String,
    pub index: f64,
    pub comment: String,
}

impl Tabular for Reading {
    const HEADERS: &'static [&'static str] = &["date", "index", "comment"];
    const NUMERIC_COLUMNS: &'static [usize] = &[1];
    type CsvRow = ReadingExportRow;

    fn cells(&self) -> Vec<String> {
        vec![
            self.date.to_string(),
            format!("{:.2}", self.index_value),
            self.comment.clone(),
        ]
    }

    fn csv_row(&self) -> ReadingExportRow {
        ReadingExportRow {
            meter_id: self.meter_id,
            date: self.date.to_string(),
            index: self.index_value,
            comment: self.comment.clone(),
        }
    }
}
