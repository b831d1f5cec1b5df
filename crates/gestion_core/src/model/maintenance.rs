//! Maintenance register (Registre) model.
//!
//! # Invariants
//! - Recurrence intervals are at least 1.
//! - `until`, when set, is not earlier than `start_date`.
//! - Occurrence `n` is always computed from `start_date`, never chained from
//!   occurrence `n - 1`, so month-end clamping does not drift.

use super::{require_non_blank, RecordId, ValidationError};
use crate::export::Tabular;
use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Repeat rule of a maintenance entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "interval", rename_all = "snake_case")]
pub enum Recurrence {
    Days(u32),
    Weeks(u32),
    Months(u32),
    Years(u32),
}

impl Recurrence {
    pub fn interval(self) -> u32 {
        match self {
            Self::Days(n) | Self::Weeks(n) | Self::Months(n) | Self::Years(n) => n,
        }
    }

    pub fn unit_str(self) -> &'static str {
        match self {
            Self::Days(_) => "days",
            Self::Weeks(_) => "weeks",
            Self::Months(_) => "months",
            Self::Years(_) => "years",
        }
    }

    pub fn from_parts(unit: &str, interval: u32) -> Option<Self> {
        match unit.trim().to_ascii_lowercase().as_str() {
            "day" | "days" => Some(Self::Days(interval)),
            "week" | "weeks" => Some(Self::Weeks(interval)),
            "month" | "months" => Some(Self::Months(interval)),
            "year" | "years" => Some(Self::Years(interval)),
            _ => None,
        }
    }

    /// Parses `3 months`, `1 week`, `2y` style rules.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let split_at = text
            .find(|ch: char| !ch.is_ascii_digit())
            .unwrap_or(text.len());
        let (number, unit) = text.split_at(split_at);
        let interval: u32 = number.parse().ok()?;
        let unit = match unit.trim() {
            "d" => "days",
            "w" => "weeks",
            "m" => "months",
            "y" => "years",
            other => other,
        };
        Self::from_parts(unit, interval)
    }

    /// Returns occurrence `n` (0 = `start`), or `None` past chrono's range.
    pub fn nth(self, start: NaiveDate, n: u32) -> Option<NaiveDate> {
        let steps = u64::from(self.interval()) * u64::from(n);
        match self {
            Self::Days(_) => start.checked_add_signed(Duration::days(i64::try_from(steps).ok()?)),
            Self::Weeks(_) => {
                start.checked_add_signed(Duration::weeks(i64::try_from(steps).ok()?))
            }
            Self::Months(_) => start.checked_add_months(Months::new(u32::try_from(steps).ok()?)),
            Self::Years(_) => {
                start.checked_add_months(Months::new(u32::try_from(steps.checked_mul(12)?).ok()?))
            }
        }
    }

    /// Lower bound for the first occurrence index that can land on or after
    /// `from`. Never overshoots.
    pub(crate) fn index_lower_bound(self, start: NaiveDate, from: NaiveDate) -> u32 {
        if from <= start || self.interval() == 0 {
            return 0;
        }
        let days = (from - start).num_days();
        let period_days: i64 = match self {
            Self::Days(n) => i64::from(n),
            Self::Weeks(n) => i64::from(n) * 7,
            // Longest month / year keep the estimate below the real index.
            Self::Months(n) => i64::from(n) * 31,
            Self::Years(n) => i64::from(n) * 366,
        };
        u32::try_from((days / period_days).saturating_sub(1).max(0)).unwrap_or(u32::MAX)
    }
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "every {} {}", self.interval(), self.unit_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceEntry {
    pub id: Option<RecordId>,
    pub title: String,
    pub equipment: String,
    pub category: String,
    /// First due date.
    pub start_date: NaiveDate,
    /// `None` for one-off operations.
    pub recurrence: Option<Recurrence>,
    /// Last date an occurrence may fall on.
    pub until: Option<NaiveDate>,
    pub last_done: Option<NaiveDate>,
    pub notes: String,
    pub archived: bool,
}

impl MaintenanceEntry {
    pub fn new(title: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            id: None,
            title: title.into(),
            equipment: String::new(),
            category: String::new(),
            start_date,
            recurrence: None,
            until: None,
            last_done: None,
            notes: String::new(),
            archived: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("title", &self.title)?;
        if let Some(rule) = self.recurrence {
            if rule.interval() == 0 {
                return Err(ValidationError::new(
                    "recurrence",
                    "interval must be at least 1",
                ));
            }
        }
        if let Some(until) = self.until {
            if until < self.start_date {
                return Err(ValidationError::new(
                    "until",
                    format!("{until} is before start date {}", self.start_date),
                ));
            }
        }
        Ok(())
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }
}

/// One completed occurrence recorded in the history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: Option<RecordId>,
    pub entry_id: RecordId,
    pub done_on: NaiveDate,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceExportRow {
    pub id: Option<RecordId>,
    pub title: String,
    pub equipment: String,
    pub category: String,
    pub start_date: String,
    pub recurrence: String,
    pub until: String,
    pub last_done: String,
    pub archived: bool,
    pub notes: String,
}

impl Tabular for MaintenanceEntry {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "title",
        "equipment",
        "category",
        "start",
        "recurrence",
        "last done",
    ];
    const NUMERIC_COLUMNS: &'static [usize] = &[0];
    type CsvRow = MaintenanceExportRow;

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.map(|id| id.to_string()).unwrap_or_default(),
            self.title.clone(),
            self.equipment.clone(),
            self.category.clone(),
            self.start_date.to_string(),
            self.recurrence
                .map(|rule| rule.to_string())
                .unwrap_or_else(|| "once".to_string()),
            self.last_done.map(|d| d.to_string()).unwrap_or_default(),
        ]
    }

    fn csv_row(&self) -> MaintenanceExportRow {
        MaintenanceExportRow {
            id: self.id,
            title: self.title.clone(),
            equipment: self.equipment.clone(),
            category: self.category.clone(),
            start_date: self.start_date.to_string(),
            recurrence: self.recurrence.map(|r| r.to_string()).unwrap_or_default(),
            until: self.until.map(|d| d.to_string()).unwrap_or_default(),
            last_done: self.last_done.map(|d| d.to_string()).unwrap_or_default(),
            archived: self.archived,
            notes: self.notes.clone(),
        }
    }
}
