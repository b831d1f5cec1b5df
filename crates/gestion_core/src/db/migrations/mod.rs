//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations per store in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic within one store.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - A database file only ever receives the migrations of its own store.

use crate::db::{DbError, DbResult, Store};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const ORDER_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_orders.sql"),
}];

const QUOTE_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_quotes.sql"),
}];

const METER_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_meters.sql"),
}];

const MAINTENANCE_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("0001_maintenance.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("0002_maintenance_history.sql"),
    },
];

const LIBRARY_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_library.sql"),
}];

const TASK_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_tasks.sql"),
}];

fn migrations_for(store: Store) -> &'static [Migration] {
    match store {
        Store::Orders => ORDER_MIGRATIONS,
        Store::Quotes => QUOTE_MIGRATIONS,
        Store::Meters => METER_MIGRATIONS,
        Store::Maintenance => MAINTENANCE_MIGRATIONS,
        Store::Library => LIBRARY_MIGRATIONS,
        Store::Tasks => TASK_MIGRATIONS,
    }
}

/// Returns the latest migration version known by this binary for `store`.
pub fn latest_version(store: Store) -> u32 {
    migrations_for(store)
        .last()
        .map_or(0, |migration| migration.version)
}

/// Applies all pending migrations of `store` on the provided connection.
pub fn apply_migrations(conn: &mut Connection, store: Store) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version(store);

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            store,
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in migrations_for(store) {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

/// Reads `PRAGMA user_version` from the connection.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::{latest_version, migrations_for};
    use crate::db::Store;

    #[test]
    fn every_store_has_monotonic_migrations() {
        for store in Store::ALL {
            let versions: Vec<u32> = migrations_for(store).iter().map(|m| m.version).collect();
            assert!(!versions.is_empty(), "{store:?} has no migrations");
            assert!(versions.windows(2).all(|pair| pair[0] < pair[1]));
            assert_eq!(latest_version(store), *versions.last().unwrap());
        }
    }
}
