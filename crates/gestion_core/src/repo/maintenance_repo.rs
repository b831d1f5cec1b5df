//! Maintenance register repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist maintenance entries with their recurrence rule.
//! - Record completed occurrences in `maintenance_history`.
//!
//! # Invariants
//! - `recurrence_unit` and `recurrence_interval` are both set or both null.
//! - Completing an occurrence writes history and `last_done` atomically.

use super::{
    bool_to_int, contains_pattern, ensure_store_ready, parse_bool_column, parse_date_column,
    parse_optional_date_column, RepoError, RepoResult,
};
use crate::db::Store;
use crate::model::maintenance::{MaintenanceEntry, MaintenanceRecord, Recurrence};
use crate::model::RecordId;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ENTRY_SELECT_SQL: &str = "SELECT
    id,
    title,
    equipment,
    category,
    start_date,
    recurrence_unit,
    recurrence_interval,
    until_date,
    last_done,
    notes,
    is_archived
FROM maintenance_entries";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceQuery {
    /// Case-insensitive substring of the equipment name.
    pub equipment: Option<String>,
    /// Exact category match.
    pub category: Option<String>,
    /// Substring of title or notes.
    pub text: Option<String>,
    pub include_archived: bool,
}

pub trait MaintenanceRepository {
    fn create_entry(&self, entry: &MaintenanceEntry) -> RepoResult<RecordId>;
    fn update_entry(&self, entry: &MaintenanceEntry) -> RepoResult<()>;
    fn get_entry(&self, id: RecordId) -> RepoResult<Option<MaintenanceEntry>>;
    fn delete_entry(&self, id: RecordId) -> RepoResult<()>;
    fn search_entries(&self, query: &MaintenanceQuery) -> RepoResult<Vec<MaintenanceEntry>>;
    /// Appends a history row and moves `last_done`, optionally archiving.
    fn record_completion(
        &self,
        id: RecordId,
        done_on: NaiveDate,
        comment: &str,
        archive: bool,
    ) -> RepoResult<RecordId>;
    fn history(&self, id: RecordId) -> RepoResult<Vec<MaintenanceRecord>>;
}

pub struct SqliteMaintenanceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMaintenanceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_store_ready(conn, Store::Maintenance)?;
        Ok(Self { conn })
    }
}

impl MaintenanceRepository for SqliteMaintenanceRepository<'_> {
    fn create_entry(&self, entry: &MaintenanceEntry) -> RepoResult<RecordId> {
        entry.validate()?;
        self.conn.execute(
            "INSERT INTO maintenance_entries (
                title,
                equipment,
                category,
                start_date,
                recurrence_unit,
                recurrence_interval,
                until_date,
                last_done,
                notes,
                is_archived
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                entry.title.trim(),
                entry.equipment.trim(),
                entry.category.trim(),
                entry.start_date.to_string(),
                entry.recurrence.map(Recurrence::unit_str),
                entry.recurrence.map(Recurrence::interval),
                entry.until.map(|d| d.to_string()),
                entry.last_done.map(|d| d.to_string()),
                entry.notes.as_str(),
                bool_to_int(entry.archived),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_entry(&self, entry: &MaintenanceEntry) -> RepoResult<()> {
        entry.validate()?;
        let id = entry.id.ok_or_else(|| {
            RepoError::InvalidData("cannot update a maintenance entry without id".to_string())
        })?;
        let changed = self.conn.execute(
            "UPDATE maintenance_entries
             SET
                title = ?1,
                equipment = ?2,
                category = ?3,
                start_date = ?4,
                recurrence_unit = ?5,
                recurrence_interval = ?6,
                until_date = ?7,
                last_done = ?8,
                notes = ?9,
                is_archived = ?10,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?11;",
            params![
                entry.title.trim(),
                entry.equipment.trim(),
                entry.category.trim(),
                entry.start_date.to_string(),
                entry.recurrence.map(Recurrence::unit_str),
                entry.recurrence.map(Recurrence::interval),
                entry.until.map(|d| d.to_string()),
                entry.last_done.map(|d| d.to_string()),
                entry.notes.as_str(),
                bool_to_int(entry.archived),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "maintenance entry",
                id,
            });
        }
        Ok(())
    }

    fn get_entry(&self, id: RecordId) -> RepoResult<Option<MaintenanceEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTRY_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entry_row(row)?));
        }
        Ok(None)
    }

    fn delete_entry(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM maintenance_entries WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "maintenance entry",
                id,
            });
        }
        Ok(())
    }

    fn search_entries(&self, query: &MaintenanceQuery) -> RepoResult<Vec<MaintenanceEntry>> {
        let mut sql = format!("{ENTRY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_archived {
            sql.push_str(" AND is_archived = 0");
        }
        if let Some(equipment) = query.equipment.as_deref().filter(|e| !e.trim().is_empty()) {
            sql.push_str(" AND equipment LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(contains_pattern(equipment)));
        }
        if let Some(category) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
            sql.push_str(" AND category = ? COLLATE NOCASE");
            bind_values.push(Value::Text(category.trim().to_string()));
        }
        if let Some(text) = query.text.as_deref().filter(|t| !t.trim().is_empty()) {
            sql.push_str(" AND (title LIKE ? ESCAPE '\\' OR notes LIKE ? ESCAPE '\\')");
            let pattern = contains_pattern(text);
            bind_values.push(Value::Text(pattern.clone()));
            bind_values.push(Value::Text(pattern));
        }
        sql.push_str(" ORDER BY start_date ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }

    fn record_completion(
        &self,
        id: RecordId,
        done_on: NaiveDate,
        comment: &str,
        archive: bool,
    ) -> RepoResult<RecordId> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE maintenance_entries
             SET
                last_done = CASE
                    WHEN last_done IS NULL OR last_done < ?1 THEN ?1
                    ELSE last_done
                END,
                is_archived = CASE WHEN ?2 = 1 THEN 1 ELSE is_archived END,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?3;",
            params![done_on.to_string(), bool_to_int(archive), id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "maintenance entry",
                id,
            });
        }
        tx.execute(
            "INSERT INTO maintenance_history (entry_id, done_on, comment) VALUES (?1, ?2, ?3);",
            params![id, done_on.to_string(), comment],
        )?;
        let history_id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(history_id)
    }

    fn history(&self, id: RecordId) -> RepoResult<Vec<MaintenanceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entry_id, done_on, comment
             FROM maintenance_history
             WHERE entry_id = ?1
             ORDER BY done_on DESC, id DESC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let done_on: String = row.get("done_on")?;
            records.push(MaintenanceRecord {
                id: Some(row.get("id")?),
                entry_id: row.get("entry_id")?,
                done_on: parse_date_column(&done_on, "maintenance_history", "done_on")?,
                comment: row.get("comment")?,
            });
        }
        Ok(records)
    }
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<MaintenanceEntry> {
    let start_text: String = row.get("start_date")?;
    let unit: Option<String> = row.get("recurrence_unit")?;
    let interval: Option<u32> = row.get("recurrence_interval")?;
    let recurrence = match (unit, interval) {
        (None, None) => None,
        (Some(unit), Some(interval)) => Some(Recurrence::from_parts(&unit, interval).ok_or_else(
            || {
                RepoError::InvalidData(format!(
                    "invalid recurrence unit `{unit}` in maintenance_entries.recurrence_unit"
                ))
            },
        )?),
        _ => {
            return Err(RepoError::InvalidData(
                "recurrence unit and interval must be set together".to_string(),
            ))
        }
    };

    let entry = MaintenanceEntry {
        id: Some(row.get("id")?),
        title: row.get("title")?,
        equipment: row.get("equipment")?,
        category: row.get("category")?,
        start_date: parse_date_column(&start_text, "maintenance_entries", "start_date")?,
        recurrence,
        until: parse_optional_date_column(
            row.get("until_date")?,
            "maintenance_entries",
            "until_date",
        )?,
        last_done: parse_optional_date_column(
            row.get("last_done")?,
            "maintenance_entries",
            "last_done",
        )?,
        notes: row.get("notes")?,
        archived: parse_bool_column(row.get("is_archived")?, "maintenance_entries", "is_archived")?,
    };
    entry.validate().map_err(|err| {
        RepoError::InvalidData(format!("maintenance_entries row failed validation: {err}"))
    })?;
    Ok(entry)
}
