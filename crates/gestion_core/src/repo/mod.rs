//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts, one per store.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must enforce model `validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.
//! - Repositories refuse connections not migrated for their store.

pub mod document_repo;
pub mod maintenance_repo;
pub mod meter_repo;
pub mod order_repo;
pub mod quote_repo;
pub mod task_repo;

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{DbError, Store};
use crate::model::{RecordId, ValidationError};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Shared repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound {
        entity: &'static str,
        id: RecordId,
    },
    /// Write would break a uniqueness or structural rule.
    Conflict(String),
    InvalidData(String),
    /// Connection schema does not belong to / is not migrated for this store.
    UninitializedConnection {
        store: Store,
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                store,
                expected_version,
                actual_version,
            } => write!(
                f,
                "{} repository requires schema version {expected_version}, got {actual_version}",
                store.as_str()
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::Conflict(_) => None,
            Self::InvalidData(_) => None,
            Self::UninitializedConnection { .. } => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Verifies `conn` carries the fully migrated schema of `store`.
pub(crate) fn ensure_store_ready(conn: &Connection, store: Store) -> RepoResult<()> {
    let actual_version = current_user_version(conn)?;
    let expected_version = latest_version(store);
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            store,
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

/// Maps a UNIQUE constraint failure to `Conflict`, passing other errors through.
pub(crate) fn map_unique_violation(
    err: rusqlite::Error,
    message: impl FnOnce() -> String,
) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(code, _)
            if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            RepoError::Conflict(message())
        }
        _ => RepoError::from(err),
    }
}

/// Escapes LIKE wildcards for use with `ESCAPE '\\'`.
pub(crate) fn like_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.trim().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Builds a `LIKE ... ESCAPE '\\'` pattern matching `text` anywhere.
pub(crate) fn contains_pattern(text: &str) -> String {
    format!("%{}%", like_escape(text))
}

pub(crate) fn parse_date_column(
    value: &str,
    table: &str,
    column: &str,
) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        RepoError::InvalidData(format!("invalid date `{value}` in {table}.{column}"))
    })
}

pub(crate) fn parse_optional_date_column(
    value: Option<String>,
    table: &str,
    column: &str,
) -> RepoResult<Option<NaiveDate>> {
    value
        .map(|text| parse_date_column(&text, table, column))
        .transpose()
}

pub(crate) fn parse_bool_column(value: i64, table: &str, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {table}.{column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

/// Appends `LIMIT`/`OFFSET` clauses the way SQLite expects them.
pub(crate) fn push_pagination(
    sql: &mut String,
    bind_values: &mut Vec<rusqlite::types::Value>,
    limit: Option<u32>,
    offset: u32,
) {
    use rusqlite::types::Value;

    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(offset)));
        }
    } else if offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        bind_values.push(Value::Integer(i64::from(offset)));
    }
}

#[cfg(test)]
mod tests {
    use super::contains_pattern;

    #[test]
    fn contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern(" boiler "), "%boiler%");
    }
}
