use gestion_core::db::migrations::latest_version;
use gestion_core::db::{open_db, open_db_in_memory, open_store, DbError, Store};
use rusqlite::Connection;

#[test]
fn every_store_migrates_to_its_latest_version() {
    for store in Store::ALL {
        let conn = open_db_in_memory(store).unwrap();
        assert_eq!(schema_version(&conn), latest_version(store), "{store:?}");
    }

    let conn = open_db_in_memory(Store::Meters).unwrap();
    assert_table_exists(&conn, "categories");
    assert_table_exists(&conn, "meters");
    assert_table_exists(&conn, "readings");

    let conn = open_db_in_memory(Store::Maintenance).unwrap();
    assert_table_exists(&conn, "maintenance_entries");
    assert_table_exists(&conn, "maintenance_history");
}

#[test]
fn each_store_only_receives_its_own_tables() {
    let conn = open_db_in_memory(Store::Orders).unwrap();
    assert_table_exists(&conn, "orders");
    assert_table_missing(&conn, "quotes");
    assert_table_missing(&conn, "readings");
}

#[test]
fn reopening_a_store_file_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registre.db");

    let conn_first = open_db(&path, Store::Maintenance).unwrap();
    assert_eq!(schema_version(&conn_first), 2);
    drop(conn_first);

    let conn_second = open_db(&path, Store::Maintenance).unwrap();
    assert_eq!(schema_version(&conn_second), 2);
    assert_table_exists(&conn_second, "maintenance_history");
}

#[test]
fn maintenance_store_upgrades_from_first_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registre.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(include_str!("../src/db/migrations/0001_maintenance.sql"))
        .unwrap();
    conn.execute_batch("PRAGMA user_version = 1;").unwrap();
    drop(conn);

    let conn = open_db(&path, Store::Maintenance).unwrap();
    assert_eq!(schema_version(&conn), latest_version(Store::Maintenance));
    assert_table_exists(&conn, "maintenance_history");
}

#[test]
fn open_store_creates_data_dir_and_named_file() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("nested").join("data");

    let conn = open_store(&data_dir, Store::Library).unwrap();
    assert_table_exists(&conn, "documents");
    assert!(data_dir.join("bibliotheque.db").is_file());
}

#[test]
fn file_from_newer_build_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path, Store::Tasks).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            store,
            db_version,
            latest_supported,
        } => {
            assert_eq!(store, Store::Tasks);
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version(Store::Tasks));
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn table_exists(conn: &Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    exists == 1
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert!(table_exists(conn, table_name), "table {table_name} does not exist");
}

fn assert_table_missing(conn: &Connection, table_name: &str) {
    assert!(!table_exists(conn, table_name), "table {table_name} should not exist");
}
