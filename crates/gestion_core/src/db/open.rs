//! Connection opening for one store.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a 5 s busy timeout.
//! - Returned connections are migrated to the store's latest version.

use super::migrations::apply_migrations;
use super::{DbError, DbResult, Store};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

enum Target<'a> {
    File(&'a Path),
    Memory,
}

impl Target<'_> {
    fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens (or creates) the database file at `path` for `store`.
///
/// Logs one `db_open` start event and one ok/error event with the duration.
pub fn open_db(path: impl AsRef<Path>, store: Store) -> DbResult<Connection> {
    open_target(Target::File(path.as_ref()), store)
}

/// Fresh in-memory database with the full schema of `store`.
pub fn open_db_in_memory(store: Store) -> DbResult<Connection> {
    open_target(Target::Memory, store)
}

/// Opens `<data_dir>/<store file>`, creating `data_dir` when missing.
pub fn open_store(data_dir: impl AsRef<Path>, store: Store) -> DbResult<Connection> {
    let data_dir = data_dir.as_ref();
    std::fs::create_dir_all(data_dir).map_err(|source| DbError::DataDir {
        path: data_dir.to_path_buf(),
        source,
    })?;
    open_db(data_dir.join(store.file_name()), store)
}

fn open_target(target: Target<'_>, store: Store) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = target.mode();
    info!("event=db_open module=db status=start mode={mode} store={store}");

    let opened = match target {
        Target::File(path) => Connection::open(path),
        Target::Memory => Connection::open_in_memory(),
    }
    .map_err(DbError::from)
    .and_then(|mut conn| {
        prepare(&mut conn, store)?;
        Ok(conn)
    });

    let elapsed = started_at.elapsed().as_millis();
    match &opened {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={mode} store={store} duration_ms={elapsed}"
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} store={store} duration_ms={elapsed} error={err}"
        ),
    }
    opened
}

fn prepare(conn: &mut Connection, store: Store) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn, store)
}
