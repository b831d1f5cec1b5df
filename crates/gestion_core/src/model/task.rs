//! Task manager model.
//!
//! # Invariants
//! - `completed_at` is set if and only if `status == TaskStatus::Done`.

use super::{require_non_blank, RecordId, ValidationError};
use crate::export::Tabular;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "todo" => Some(Self::Todo),
            "in_progress" | "in-progress" | "doing" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Open tasks still need work.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Todo | Self::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<RecordId>,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    /// Epoch milliseconds; assigned by storage.
    pub created_at: Option<i64>,
    /// Epoch milliseconds when the task entered `Done`.
    pub completed_at: Option<i64>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            priority: TaskPriority::Normal,
            status: TaskStatus::Todo,
            due_date: None,
            created_at: None,
            completed_at: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("title", &self.title)?;
        Ok(())
    }

    /// Open and due strictly before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status.is_open() && self.due_date.is_some_and(|due| due < today)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskExportRow {
    pub id: Option<RecordId>,
    pub title: String,
    pub priority: &'static str,
    pub status: &'static str,
    pub due_date: String,
    pub description: String,
}

impl Tabular for Task {
    const HEADERS: &'static [&'static str] = &["id", "title", "priority", "status", "due"];
    const NUMERIC_COLUMNS: &'static [usize] = &[0];
    type CsvRow = TaskExportRow;

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.map(|id| id.to_string()).unwrap_or_default(),
            self.title.clone(),
            self.priority.as_str().to_string(),
            self.status.as_str().to_string(),
            self.due_date.map(|d| d.to_string()).unwrap_or_default(),
        ]
    }

    fn csv_row(&self) -> TaskExportRow {
        TaskExportRow {
            id: self.id,
            title: self.title.clone(),
            priority: self.priority.as_str(),
            status: self.status.as_str(),
            due_date: self.due_date.map(|d| d.to_string()).unwrap_or_default(),
            description: self.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Task, TaskPriority, TaskStatus};
    use chrono::NaiveDate;

    #[test]
    fn overdue_only_for_open_tasks() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let mut task = Task::new("renew insurance");
        task.due_date = NaiveDate::from_ymd_opt(2024, 6, 9);
        assert!(task.is_overdue(today));
        task.status = TaskStatus::Done;
        assert!(!task.is_overdue(today));
    }

    #[test]
    fn priorities_sort_by_urgency() {
        assert!(TaskPriority::Urgent > TaskPriority::High);
        assert!(TaskPriority::Low < TaskPriority::Normal);
        assert_eq!(TaskPriority::parse(" HIGH "), Some(TaskPriority::High));
    }
}
