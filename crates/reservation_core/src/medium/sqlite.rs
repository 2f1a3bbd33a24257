//! File-backed medium shared across processes.
//!
//! # Responsibility
//! - Store whole-value records in the `records` table.
//! - Discover writes made by other processes through revision polling.
//!
//! # Invariants
//! - Every write or removal takes a revision greater than any stored one.
//! - Removal leaves a tombstone (`value IS NULL`) so pollers observe it.
//! - Events are only emitted for rows whose origin is another context.
//! - Writes run in IMMEDIATE transactions; concurrent writers queue on the
//!   busy timeout instead of failing.

use super::{
    lock, ChangeListener, ContextId, ListenerRegistry, MediumError, MediumResult, StorageEvent,
    StorageMedium, SubscriptionId,
};
use crate::db::{open_db, open_db_in_memory};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

struct SqliteState {
    conn: Connection,
    /// Highest revision already observed by `poll_external_changes`.
    watermark: i64,
}

/// One context handle over a SQLite-backed storage area.
pub struct SqliteMedium {
    context: ContextId,
    state: Mutex<SqliteState>,
    listeners: ListenerRegistry,
}

impl SqliteMedium {
    /// Opens (or creates) the storage file at `path` as a new context.
    pub fn open(path: impl AsRef<Path>) -> MediumResult<Self> {
        let conn = open_db(path)?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory storage area.
    pub fn open_in_memory() -> MediumResult<Self> {
        let conn = open_db_in_memory()?;
        Self::from_connection(conn)
    }

    /// Wraps an already migrated connection.
    ///
    /// Changes stored before this call are treated as already observed.
    pub fn from_connection(conn: Connection) -> MediumResult<Self> {
        let watermark = max_revision(&conn)?;
        let context = Uuid::new_v4();
        info!(
            "event=medium_open module=medium status=ok backend=sqlite context={} revision={}",
            context, watermark
        );
        Ok(Self {
            context,
            state: Mutex::new(SqliteState { conn, watermark }),
            listeners: ListenerRegistry::default(),
        })
    }

    /// Checks for writes made by other contexts since the last poll.
    ///
    /// Each changed key yields one event (intermediate writes to the same key
    /// collapse into the latest). Returns the number of events dispatched.
    pub fn poll_external_changes(&self) -> MediumResult<usize> {
        let changed = {
            let mut state = lock(&self.state);
            let mut stmt = state.conn.prepare(
                "SELECT key, origin, revision
                 FROM records
                 WHERE revision > ?1
                 ORDER BY revision ASC;",
            )?;
            let rows = stmt
                .query_map([state.watermark], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            drop(stmt);

            if let Some((_, _, revision)) = rows.last() {
                state.watermark = *revision;
            }
            rows
        };

        let mut events = Vec::new();
        for (key, origin, _) in changed {
            let origin = Uuid::parse_str(&origin).map_err(|_| {
                MediumError::InvalidData(format!("invalid origin `{origin}` in records.origin"))
            })?;
            if origin != self.context {
                events.push(StorageEvent { key, origin });
            }
        }

        for event in &events {
            let delivered = self.listeners.dispatch(event);
            debug!(
                "event=medium_notify module=medium status=ok backend=sqlite key={} origin={} listeners={}",
                event.key, event.origin, delivered
            );
        }
        Ok(events.len())
    }

    fn write_value(&self, key: &str, value: Option<&str>) -> MediumResult<()> {
        let mut state = lock(&self.state);
        // Take the write lock before reading so a busy file waits on
        // busy_timeout instead of failing the lock upgrade.
        let tx = state
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<Option<String>> = tx
            .query_row(
                "SELECT value FROM records WHERE key = ?1;",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        if existing.flatten().as_deref() == value {
            return Ok(());
        }

        let revision = max_revision(&tx)? + 1;
        tx.execute(
            "INSERT INTO records (key, value, origin, revision)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                origin = excluded.origin,
                revision = excluded.revision,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value, self.context.to_string(), revision],
        )?;
        tx.commit()?;
        Ok(())
    }
}

impl StorageMedium for SqliteMedium {
    fn context_id(&self) -> ContextId {
        self.context
    }

    fn get_item(&self, key: &str) -> MediumResult<Option<String>> {
        let state = lock(&self.state);
        let value: Option<Option<String>> = state
            .conn
            .query_row(
                "SELECT value FROM records WHERE key = ?1;",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    fn set_item(&self, key: &str, value: &str) -> MediumResult<()> {
        self.write_value(key, Some(value))
    }

    fn remove_item(&self, key: &str) -> MediumResult<()> {
        self.write_value(key, None)
    }

    fn subscribe(&self, listener: ChangeListener) -> SubscriptionId {
        self.listeners.add(self.context, listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.remove(id)
    }
}

fn max_revision(conn: &Connection) -> MediumResult<i64> {
    let revision = conn.query_row(
        "SELECT COALESCE(MAX(revision), 0) FROM records;",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(revision)
}
