//! Meter repository: category tree, meters and index readings.
//!
//! # Responsibility
//! - Persist the variable-depth category hierarchy and keep it acyclic.
//! - Provide CRUD over meters and their readings.
//!
//! # Invariants
//! - A category is never moved under itself or one of its descendants.
//! - Categories with children or meters cannot be deleted.
//! - Deleting a meter deletes its readings (`ON DELETE CASCADE`).
//! - Readings are listed in `reading_date ASC` order.

use super::{
    bool_to_int, ensure_store_ready, map_unique_violation, parse_bool_column, parse_date_column,
    RepoError, RepoResult,
};
use crate::db::Store;
use crate::model::meter::{Category, CategoryNode, Meter, Reading};
use crate::model::RecordId;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;

/// Upper bound on hierarchy depth walked by recursive queries.
const MAX_CATEGORY_DEPTH: i64 = 64;

const METER_SELECT_SQL: &str = "SELECT
    id,
    name,
    category_id,
    unit,
    is_active,
    notes
FROM meters";

const READING_SELECT_SQL: &str = "SELECT
    id,
    meter_id,
    reading_date,
    index_value,
    comment
FROM readings";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeterQuery {
    /// Restrict to meters in this category or any of its descendants.
    pub category_id: Option<RecordId>,
    pub include_inactive: bool,
}

/// Inclusive date window for reading queries; a missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// `None` when both bounds are open.
    pub fn between(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Option<Self> {
        if from.is_none() && to.is_none() {
            return None;
        }
        Some(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| from <= date) && self.to.map_or(true, |to| date <= to)
    }
}

pub trait MeterRepository {
    fn create_category(&self, category: &Category) -> RepoResult<RecordId>;
    fn rename_category(&self, id: RecordId, name: &str) -> RepoResult<()>;
    fn move_category(&self, id: RecordId, new_parent: Option<RecordId>) -> RepoResult<()>;
    fn delete_category(&self, id: RecordId) -> RepoResult<()>;
    fn get_category(&self, id: RecordId) -> RepoResult<Option<Category>>;
    fn list_categories(&self) -> RepoResult<Vec<Category>>;
    fn category_tree(&self) -> RepoResult<Vec<CategoryNode>>;
    /// Names from the root down to `id`.
    fn category_path(&self, id: RecordId) -> RepoResult<Vec<String>>;
    /// `id` followed by every descendant id.
    fn category_subtree(&self, id: RecordId) -> RepoResult<Vec<RecordId>>;

    fn create_meter(&self, meter: &Meter) -> RepoResult<RecordId>;
    fn update_meter(&self, meter: &Meter) -> RepoResult<()>;
    fn set_meter_active(&self, id: RecordId, active: bool) -> RepoResult<()>;
    fn delete_meter(&self, id: RecordId) -> RepoResult<()>;
    fn get_meter(&self, id: RecordId) -> RepoResult<Option<Meter>>;
    fn get_meter_by_name(&self, name: &str) -> RepoResult<Option<Meter>>;
    fn list_meters(&self, query: &MeterQuery) -> RepoResult<Vec<Meter>>;

    fn add_reading(&self, reading: &Reading) -> RepoResult<RecordId>;
    fn update_reading(&self, reading: &Reading) -> RepoResult<()>;
    fn delete_reading(&self, id: RecordId) -> RepoResult<()>;
    fn get_reading(&self, id: RecordId) -> RepoResult<Option<Reading>>;
    fn list_readings(&self, meter_id: RecordId, range: Option<DateRange>)
        -> RepoResult<Vec<Reading>>;
    /// Closest reading strictly before `date`.
    fn reading_before(&self, meter_id: RecordId, date: NaiveDate) -> RepoResult<Option<Reading>>;
    /// Closest reading strictly after `date`.
    fn reading_after(&self, meter_id: RecordId, date: NaiveDate) -> RepoResult<Option<Reading>>;
    fn latest_reading(&self, meter_id: RecordId) -> RepoResult<Option<Reading>>;
}

pub struct SqliteMeterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMeterRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_store_ready(conn, Store::Meters)?;
        Ok(Self { conn })
    }

    fn ensure_category_exists(&self, id: RecordId) -> RepoResult<()> {
        if self.get_category(id)?.is_none() {
            return Err(RepoError::NotFound {
                entity: "category",
                id,
            });
        }
        Ok(())
    }
}

impl MeterRepository for SqliteMeterRepository<'_> {
    fn create_category(&self, category: &Category) -> RepoResult<RecordId> {
        category.validate()?;
        if let Some(parent_id) = category.parent_id {
            self.ensure_category_exists(parent_id)?;
        }
        let name = category.name.trim();
        self.conn
            .execute(
                "INSERT INTO categories (name, parent_id) VALUES (?1, ?2);",
                params![name, category.parent_id],
            )
            .map_err(|err| {
                map_unique_violation(err, || {
                    format!("category `{name}` already exists at this level")
                })
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    fn rename_category(&self, id: RecordId, name: &str) -> RepoResult<()> {
        Category::new(name, None).validate()?;
        let name = name.trim();
        let changed = self
            .conn
            .execute(
                "UPDATE categories
                 SET
                    name = ?1,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?2;",
                params![name, id],
            )
            .map_err(|err| {
                map_unique_violation(err, || {
                    format!("category `{name}` already exists at this level")
                })
            })?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "category",
                id,
            });
        }
        Ok(())
    }

    fn move_category(&self, id: RecordId, new_parent: Option<RecordId>) -> RepoResult<()> {
        self.ensure_category_exists(id)?;
        if let Some(parent_id) = new_parent {
            self.ensure_category_exists(parent_id)?;
            if self.category_subtree(id)?.contains(&parent_id) {
                return Err(RepoError::Conflict(format!(
                    "moving category {id} under {parent_id} would create a cycle"
                )));
            }
        }
        self.conn
            .execute(
                "UPDATE categories
                 SET
                    parent_id = ?1,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?2;",
                params![new_parent, id],
            )
            .map_err(|err| {
                map_unique_violation(err, || {
                    "a category with the same name already exists under the new parent".to_string()
                })
            })?;
        Ok(())
    }

    fn delete_category(&self, id: RecordId) -> RepoResult<()> {
        self.ensure_category_exists(id)?;
        let (children, meters): (i64, i64) = self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM categories WHERE parent_id = ?1),
                (SELECT COUNT(*) FROM meters WHERE category_id = ?1);",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if children > 0 || meters > 0 {
            return Err(RepoError::Conflict(format!(
                "category {id} still holds {children} sub-categories and {meters} meters"
            )));
        }
        self.conn
            .execute("DELETE FROM categories WHERE id = ?1;", [id])?;
        Ok(())
    }

    fn get_category(&self, id: RecordId) -> RepoResult<Option<Category>> {
        let category = self
            .conn
            .query_row(
                "SELECT id, name, parent_id FROM categories WHERE id = ?1;",
                [id],
                parse_category_row,
            )
            .optional()?;
        Ok(category)
    }

    fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, parent_id FROM categories
             ORDER BY name COLLATE NOCASE ASC, id ASC;",
        )?;
        let categories = stmt
            .query_map([], parse_category_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    fn category_tree(&self) -> RepoResult<Vec<CategoryNode>> {
        let categories = self.list_categories()?;
        let mut by_parent: HashMap<Option<RecordId>, Vec<Category>> = HashMap::new();
        for category in categories {
            by_parent.entry(category.parent_id).or_default().push(category);
        }
        Ok(build_nodes(None, &mut by_parent, 0))
    }

    fn category_path(&self, id: RecordId) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE chain(id, name, parent_id, depth) AS (
                SELECT id, name, parent_id, 0 FROM categories WHERE id = ?1
                UNION ALL
                SELECT c.id, c.name, c.parent_id, chain.depth + 1
                FROM categories c
                INNER JOIN chain ON c.id = chain.parent_id
                WHERE chain.depth < ?2
             )
             SELECT name, depth FROM chain ORDER BY depth DESC;",
        )?;
        let names = stmt
            .query_map(params![id, MAX_CATEGORY_DEPTH], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        if names.is_empty() {
            return Err(RepoError::NotFound {
                entity: "category",
                id,
            });
        }
        Ok(names)
    }

    fn category_subtree(&self, id: RecordId) -> RepoResult<Vec<RecordId>> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE subtree(id, depth) AS (
                SELECT id, 0 FROM categories WHERE id = ?1
                UNION ALL
                SELECT c.id, subtree.depth + 1
                FROM categories c
                INNER JOIN subtree ON c.parent_id = subtree.id
                WHERE subtree.depth < ?2
             )
             SELECT id FROM subtree ORDER BY depth ASC, id ASC;",
        )?;
        let ids = stmt
            .query_map(params![id, MAX_CATEGORY_DEPTH], |row| row.get::<_, RecordId>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn create_meter(&self, meter: &Meter) -> RepoResult<RecordId> {
        meter.validate()?;
        self.ensure_category_exists(meter.category_id)?;
        let name = meter.name.trim();
        self.conn
            .execute(
                "INSERT INTO meters (name, category_id, unit, is_active, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    name,
                    meter.category_id,
                    meter.unit.trim(),
                    bool_to_int(meter.active),
                    meter.notes.as_str(),
                ],
            )
            .map_err(|err| map_unique_violation(err, || format!("meter `{name}` already exists")))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_meter(&self, meter: &Meter) -> RepoResult<()> {
        meter.validate()?;
        let id = meter
            .id
            .ok_or_else(|| RepoError::InvalidData("cannot update a meter without id".to_string()))?;
        self.ensure_category_exists(meter.category_id)?;
        let name = meter.name.trim();
        let changed = self
            .conn
            .execute(
                "UPDATE meters
                 SET
                    name = ?1,
                    category_id = ?2,
                    unit = ?3,
                    is_active = ?4,
                    notes = ?5,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?6;",
                params![
                    name,
                    meter.category_id,
                    meter.unit.trim(),
                    bool_to_int(meter.active),
                    meter.notes.as_str(),
                    id,
                ],
            )
            .map_err(|err| map_unique_violation(err, || format!("meter `{name}` already exists")))?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "meter", id });
        }
        Ok(())
    }

    fn set_meter_active(&self, id: RecordId, active: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE meters
             SET
                is_active = ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?2;",
            params![bool_to_int(active), id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "meter", id });
        }
        Ok(())
    }

    fn delete_meter(&self, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM meters WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "meter", id });
        }
        Ok(())
    }

    fn get_meter(&self, id: RecordId) -> RepoResult<Option<Meter>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{METER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_meter_row(row)?));
        }
        Ok(None)
    }

    fn get_meter_by_name(&self, name: &str) -> RepoResult<Option<Meter>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{METER_SELECT_SQL} WHERE name = ?1;"))?;
        let mut rows = stmt.query([name.trim()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_meter_row(row)?));
        }
        Ok(None)
    }

    fn list_meters(&self, query: &MeterQuery) -> RepoResult<Vec<Meter>> {
        let mut sql = format!("{METER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_inactive {
            sql.push_str(" AND is_active = 1");
        }
        if let Some(category_id) = query.category_id {
            let subtree = self.category_subtree(category_id)?;
            if subtree.is_empty() {
                return Err(RepoError::NotFound {
                    entity: "category",
                    id: category_id,
                });
            }
            let placeholders = vec!["?"; subtree.len()].join(", ");
            sql.push_str(&format!(" AND category_id IN ({placeholders})"));
            bind_values.extend(subtree.into_iter().map(Value::Integer));
        }
        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut meters = Vec::new();
        while let Some(row) = rows.next()? {
            meters.push(parse_meter_row(row)?);
        }
        Ok(meters)
    }

    fn add_reading(&self, reading: &Reading) -> RepoResult<RecordId> {
        reading.validate()?;
        if self.get_meter(reading.meter_id)?.is_none() {
            return Err(RepoError::NotFound {
                entity: "meter",
                id: reading.meter_id,
            });
        }
        self.conn
            .execute(
                "INSERT INTO readings (meter_id, reading_date, index_value, comment)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    reading.meter_id,
                    reading.date.to_string(),
                    reading.index_value,
                    reading.comment.as_str(),
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || {
                    format!(
                        "meter {} already has a reading on {}",
                        reading.meter_id, reading.date
                    )
                })
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_reading(&self, reading: &Reading) -> RepoResult<()> {
        reading.validate()?;
        let id = reading.id.ok_or_else(|| {
            RepoError::InvalidData("cannot update a reading without id".to_string())
        })?;
        let changed = self
            .conn
            .execute(
                "UPDATE readings
                 SET
                    reading_date = ?1,
                    index_value = ?2,
                    comment = ?3,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?4 AND meter_id = ?5;",
                params![
                    reading.date.to_string(),
                    reading.index_value,
                    reading.comment.as_str(),
                    id,
                    reading.meter_id,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || {
                    format!(
                        "meter {} already has a reading on {}",
                        reading.meter_id, reading.date
                    )
                })
            })?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "reading",
                id,
            });
        }
        Ok(())
    }

    fn delete_reading(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM readings WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "reading",
                id,
            });
        }
        Ok(())
    }

    fn get_reading(&self, id: RecordId) -> RepoResult<Option<Reading>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{READING_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_reading_row(row)?));
        }
        Ok(None)
    }

    fn list_readings(
        &self,
        meter_id: RecordId,
        range: Option<DateRange>,
    ) -> RepoResult<Vec<Reading>> {
        let mut sql = format!("{READING_SELECT_SQL} WHERE meter_id = ?");
        let mut bind_values: Vec<Value> = vec![Value::Integer(meter_id)];
        if let Some(from) = range.and_then(|r| r.from) {
            sql.push_str(" AND reading_date >= ?");
            bind_values.push(Value::Text(from.to_string()));
        }
        if let Some(to) = range.and_then(|r| r.to) {
            sql.push_str(" AND reading_date <= ?");
            bind_values.push(Value::Text(to.to_string()));
        }
        sql.push_str(" ORDER BY reading_date ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut readings = Vec::new();
        while let Some(row) = rows.next()? {
            readings.push(parse_reading_row(row)?);
        }
        Ok(readings)
    }

    fn reading_before(&self, meter_id: RecordId, date: NaiveDate) -> RepoResult<Option<Reading>> {
        let mut stmt = self.conn.prepare(&format!(
            "{READING_SELECT_SQL}
             WHERE meter_id = ?1 AND reading_date < ?2
             ORDER BY reading_date DESC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query(params![meter_id, date.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_reading_row(row)?));
        }
        Ok(None)
    }

    fn reading_after(&self, meter_id: RecordId, date: NaiveDate) -> RepoResult<Option<Reading>> {
        let mut stmt = self.conn.prepare(&format!(
            "{READING_SELECT_SQL}
             WHERE meter_id = ?1 AND reading_date > ?2
             ORDER BY reading_date ASC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query(params![meter_id, date.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_reading_row(row)?));
        }
        Ok(None)
    }

    fn latest_reading(&self, meter_id: RecordId) -> RepoResult<Option<Reading>> {
        let mut stmt = self.conn.prepare(&format!(
            "{READING_SELECT_SQL}
             WHERE meter_id = ?1
             ORDER BY reading_date DESC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query(params![meter_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_reading_row(row)?)),
            None => Ok(None),
        }
    }
}

fn build_nodes(
    parent: Option<RecordId>,
    by_parent: &mut HashMap<Option<RecordId>, Vec<Category>>,
    depth: i64,
) -> Vec<CategoryNode> {
    if depth > MAX_CATEGORY_DEPTH {
        return Vec::new();
    }
    let children = by_parent.remove(&parent).unwrap_or_default();
    children
        .into_iter()
        .map(|category| {
            let children = build_nodes(category.id, by_parent, depth + 1);
            CategoryNode { category, children }
        })
        .collect()
}

fn parse_category_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        parent_id: row.get("parent_id")?,
    })
}

fn parse_meter_row(row: &Row<'_>) -> RepoResult<Meter> {
    Ok(Meter {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        category_id: row.get("category_id")?,
        unit: row.get("unit")?,
        active: parse_bool_column(row.get("is_active")?, "meters", "is_active")?,
        notes: row.get("notes")?,
    })
}

fn parse_reading_row(row: &Row<'_>) -> RepoResult<Reading> {
    let date_text: String = row.get("reading_date")?;
    let reading = Reading {
        id: Some(row.get("id")?),
        meter_id: row.get("meter_id")?,
        date: parse_date_column(&date_text, "readings", "reading_date")?,
        index_value: row.get("index_value")?,
        comment: row.get("comment")?,
    };
    reading
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("readings row failed validation: {err}")))?;
    Ok(reading)
}
