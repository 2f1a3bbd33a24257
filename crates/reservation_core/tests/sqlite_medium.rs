use reservation_core::db::migrations::latest_version;
use reservation_core::db::{open_db, open_db_in_memory, DbError};
use reservation_core::{MediumError, SqliteMedium, StorageEvent, StorageMedium};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use std::thread;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "records");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reservations.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "records");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match SqliteMedium::open(&path) {
        Err(MediumError::Db(DbError::SchemaTooNew { found, supported })) => {
            assert_eq!(found, 999);
            assert_eq!(supported, latest_version());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("newer schema must be rejected"),
    }
}

#[test]
fn set_get_and_remove_items() {
    let medium = SqliteMedium::open_in_memory().unwrap();

    assert_eq!(medium.get_item("k").unwrap(), None);
    medium.set_item("k", "one").unwrap();
    medium.set_item("k", "two").unwrap();
    assert_eq!(medium.get_item("k").unwrap().as_deref(), Some("two"));

    medium.remove_item("k").unwrap();
    assert_eq!(medium.get_item("k").unwrap(), None);
    medium.remove_item("k").unwrap();
}

#[test]
fn polling_reports_removals_and_collapses_repeated_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reservations.sqlite3");
    let writer = SqliteMedium::open(&path).unwrap();
    let reader = SqliteMedium::open(&path).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    reader.subscribe(Arc::new(move |event: &StorageEvent| {
        sink.lock().unwrap().push(event.clone());
    }));

    writer.set_item("a", "1").unwrap();
    writer.set_item("a", "2").unwrap();
    writer.set_item("b", "1").unwrap();
    assert_eq!(reader.poll_external_changes().unwrap(), 2);

    writer.remove_item("a").unwrap();
    assert_eq!(reader.poll_external_changes().unwrap(), 1);
    assert_eq!(reader.poll_external_changes().unwrap(), 0);

    let keys: Vec<String> = seen.lock().unwrap().iter().map(|e| e.key.clone()).collect();
    assert_eq!(keys, ["a", "b", "a"]);
    assert!(seen
        .lock()
        .unwrap()
        .iter()
        .all(|event| event.origin == writer.context_id()));
}

#[test]
fn unchanged_write_does_not_bump_revision() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reservations.sqlite3");
    let writer = SqliteMedium::open(&path).unwrap();
    writer.set_item("a", "1").unwrap();

    let reader = SqliteMedium::open(&path).unwrap();
    writer.set_item("a", "1").unwrap();
    assert_eq!(reader.poll_external_changes().unwrap(), 0);
}

#[test]
fn changes_before_open_are_not_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reservations.sqlite3");
    let writer = SqliteMedium::open(&path).unwrap();
    writer.set_item("a", "1").unwrap();

    let late = SqliteMedium::open(&path).unwrap();
    assert_eq!(late.poll_external_changes().unwrap(), 0);
    assert_eq!(late.get_item("a").unwrap().as_deref(), Some("1"));
}

#[test]
fn concurrent_writers_on_one_file_all_succeed() {
    const WRITERS: usize = 4;
    const WRITES_PER_WRITER: usize = 100;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reservations.sqlite3");
    let observer = SqliteMedium::open(&path).unwrap();
    let writers: Vec<SqliteMedium> = (0..WRITERS)
        .map(|_| SqliteMedium::open(&path).unwrap())
        .collect();

    let handles: Vec<_> = writers
        .into_iter()
        .enumerate()
        .map(|(writer_index, medium)| {
            thread::spawn(move || {
                let mut failures = Vec::new();
                for write_index in 0..WRITES_PER_WRITER {
                    let value = format!("{writer_index}-{write_index}");
                    if let Err(err) = medium.set_item("shared", &value) {
                        failures.push(err.to_string());
                    }
                }
                failures
            })
        })
        .collect();

    let failures: Vec<String> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    assert!(failures.is_empty(), "writes failed: {failures:?}");

    let last_values: Vec<String> = (0..WRITERS)
        .map(|writer_index| format!("{writer_index}-{}", WRITES_PER_WRITER - 1))
        .collect();
    let stored = observer.get_item("shared").unwrap().unwrap();
    assert!(last_values.contains(&stored), "unexpected final value {stored}");
    assert_eq!(observer.poll_external_changes().unwrap(), 1);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
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
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
