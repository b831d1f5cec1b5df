//! One SQLite file per register.
//!
//! # Responsibility
//! - Name the registers (`Store`) and their database files.
//! - Hand out connections that are configured and migrated.
//!
//! # Invariants
//! - Each file carries its store's schema version in `PRAGMA user_version`.
//! - No register table is touched before its migrations have run.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, open_store};
pub use rusqlite::Connection;

pub type DbResult<T> = Result<T, DbError>;

/// One record-keeping module and its dedicated database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Store {
    Orders,
    Quotes,
    Meters,
    Maintenance,
    Library,
    Tasks,
}

impl Store {
    pub const ALL: [Store; 6] = [
        Store::Orders,
        Store::Quotes,
        Store::Meters,
        Store::Maintenance,
        Store::Library,
        Store::Tasks,
    ];

    /// Database file name under the configured data directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Orders => "commandes.db",
            Self::Quotes => "devis.db",
            Self::Meters => "compteurs.db",
            Self::Maintenance => "registre.db",
            Self::Library => "bibliotheque.db",
            Self::Tasks => "taches.db",
        }
    }

    /// Short stable name used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Quotes => "quotes",
            Self::Meters => "meters",
            Self::Maintenance => "maintenance",
            Self::Library => "library",
            Self::Tasks => "tasks",
        }
    }
}

impl Display for Store {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The data directory could not be created.
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file was written by a newer build.
    UnsupportedSchemaVersion {
        store: Store,
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::DataDir { path, source } => {
                write!(f, "cannot create data directory `{}`: {source}", path.display())
            }
            Self::UnsupportedSchemaVersion {
                store,
                db_version,
                latest_supported,
            } => write!(
                f,
                "{store} database is at schema version {db_version}, this build knows up to {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::DataDir { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
