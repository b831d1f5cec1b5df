//! Task repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `completed_at` is stamped when a task enters `done` and cleared when it
//!   leaves it; callers never write it directly.
//! - Listing order: priority (urgent first), due date (undated last), id.

use super::{ensure_store_ready, parse_optional_date_column, RepoError, RepoResult};
use crate::db::Store;
use crate::model::task::{Task, TaskPriority, TaskStatus};
use crate::model::RecordId;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    priority,
    status,
    due_date,
    created_at,
    completed_at
FROM tasks";

const PRIORITY_RANK_SQL: &str = "CASE priority
    WHEN 'urgent' THEN 3
    WHEN 'high' THEN 2
    WHEN 'normal' THEN 1
    ELSE 0
END";

const COMPLETED_AT_SQL: &str = "CASE
    WHEN ?1 = 'done' AND status = 'done' THEN completed_at
    WHEN ?1 = 'done' THEN (strftime('%s', 'now') * 1000)
    ELSE NULL
END";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    /// Only tasks at or above this priority.
    pub min_priority: Option<TaskPriority>,
    /// Only `todo` and `in_progress` tasks.
    pub only_open: bool,
    /// Only tasks due strictly before this date.
    pub due_before: Option<NaiveDate>,
}

pub trait TaskRepository {
    fn create_task(&self, task: &Task) -> RepoResult<RecordId>;
    fn update_task(&self, task: &Task) -> RepoResult<()>;
    fn get_task(&self, id: RecordId) -> RepoResult<Option<Task>>;
    fn delete_task(&self, id: RecordId) -> RepoResult<()>;
    fn list_tasks(&self, query: &TaskQuery) -> RepoResult<Vec<Task>>;
    fn set_status(&self, id: RecordId, status: TaskStatus) -> RepoResult<()>;
}

pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_store_ready(conn, Store::Tasks)?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &Task) -> RepoResult<RecordId> {
        task.validate()?;
        self.conn.execute(
            "INSERT INTO tasks (title, description, priority, status, due_date, completed_at)
             VALUES (
                ?1, ?2, ?3, ?4, ?5,
                CASE WHEN ?4 = 'done' THEN (strftime('%s', 'now') * 1000) ELSE NULL END
             );",
            params![
                task.title.trim(),
                task.description.as_str(),
                task.priority.as_str(),
                task.status.as_str(),
                task.due_date.map(|d| d.to_string()),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;
        let id = task
            .id
            .ok_or_else(|| RepoError::InvalidData("cannot update a task without id".to_string()))?;
        let changed = self.conn.execute(
            &format!(
                "UPDATE tasks
                 SET
                    completed_at = {COMPLETED_AT_SQL},
                    status = ?1,
                    title = ?2,
                    description = ?3,
                    priority = ?4,
                    due_date = ?5,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?6;"
            ),
            params![
                task.status.as_str(),
                task.title.trim(),
                task.description.as_str(),
                task.priority.as_str(),
                task.due_date.map(|d| d.to_string()),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "task", id });
        }
        Ok(())
    }

    fn get_task(&self, id: RecordId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn delete_task(&self, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM tasks WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "task", id });
        }
        Ok(())
    }

    fn list_tasks(&self, query: &TaskQuery) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        if query.only_open {
            sql.push_str(" AND status IN ('todo', 'in_progress')");
        }
        if let Some(priority) = query.min_priority {
            let allowed: Vec<&str> = [
                TaskPriority::Low,
                TaskPriority::Normal,
                TaskPriority::High,
                TaskPriority::Urgent,
            ]
            .into_iter()
            .filter(|candidate| *candidate >= priority)
            .map(TaskPriority::as_str)
            .collect();
            let placeholders = vec!["?"; allowed.len()].join(", ");
            sql.push_str(&format!(" AND priority IN ({placeholders})"));
            bind_values.extend(allowed.into_iter().map(|p| Value::Text(p.to_string())));
        }
        if let Some(due_before) = query.due_before {
            sql.push_str(" AND due_date IS NOT NULL AND due_date < ?");
            bind_values.push(Value::Text(due_before.to_string()));
        }
        sql.push_str(&format!(
            " ORDER BY {PRIORITY_RANK_SQL} DESC, due_date IS NULL, due_date ASC, id ASC"
        ));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn set_status(&self, id: RecordId, status: TaskStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE tasks
                 SET
                    completed_at = {COMPLETED_AT_SQL},
                    status = ?1,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?2;"
            ),
            params![status.as_str(), id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "task", id });
        }
        Ok(())
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let priority_text: String = row.get("priority")?;
    let priority = TaskPriority::parse(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid priority `{priority_text}` in tasks.priority"))
    })?;
    let status_text: String = row.get("status")?;
    let status = TaskStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in tasks.status"))
    })?;

    let task = Task {
        id: Some(row.get("id")?),
        title: row.get("title")?,
        description: row.get("description")?,
        priority,
        status,
        due_date: parse_optional_date_column(row.get("due_date")?, "tasks", "due_date")?,
        created_at: row.get("created_at")?,
        completed_at: row.get("completed_at")?,
    };
    task.validate()
        .map_err(|err| RepoError::InvalidData(format!("tasks row failed validation: {err}")))?;
    Ok(task)
}
