//! Embedded key-value store on SQLite.
//!
//! # Responsibility
//! - Emulate string keys, sets and atomic batches on two tables.
//! - Apply store schema migrations before returning a usable handle.
//!
//! # Invariants
//! - Every batch runs inside one SQLite transaction.
//! - Scan cursors are `member_id` values; `0` means "start" on input and
//!   "finished" on output.

use super::migrations::apply_migrations;
use super::{Batch, BatchCommand, BatchOutcome, KvStore, ScanPage, StoreError, StoreResult};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// SQLite-backed [`KvStore`].
///
/// One connection guarded by a mutex; SQLite serializes writers anyway.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

/// Opens (or creates) a store file and applies pending migrations.
///
/// # Side effects
/// - Emits `store_open` logging events with duration and status.
pub fn open_sqlite_store(path: impl AsRef<Path>, busy_timeout: Duration) -> StoreResult<SqliteStore> {
    let started_at = Instant::now();
    info!("event=store_open module=store status=start backend=sqlite mode=file");

    let result = Connection::open(path)
        .map_err(StoreError::from)
        .and_then(|mut conn| {
            bootstrap_connection(&mut conn, busy_timeout)?;
            Ok(conn)
        });
    finish_open(result, "file", started_at)
}

/// Opens a private in-memory store, mostly for tests and local runs.
pub fn open_sqlite_store_in_memory() -> StoreResult<SqliteStore> {
    let started_at = Instant::now();
    info!("event=store_open module=store status=start backend=sqlite mode=memory");

    let result = Connection::open_in_memory()
        .map_err(StoreError::from)
        .and_then(|mut conn| {
            bootstrap_connection(&mut conn, Duration::ZERO)?;
            Ok(conn)
        });
    finish_open(result, "memory", started_at)
}

fn finish_open(
    result: StoreResult<Connection>,
    mode: &str,
    started_at: Instant,
) -> StoreResult<SqliteStore> {
    match result {
        Ok(conn) => {
            info!(
                "event=store_open module=store status=ok backend=sqlite mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(SqliteStore {
                conn: Mutex::new(conn),
            })
        }
        Err(err) => {
            error!(
                "event=store_open module=store status=error backend=sqlite mode={} duration_ms={} error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, busy_timeout: Duration) -> StoreResult<()> {
    if !busy_timeout.is_zero() {
        conn.busy_timeout(busy_timeout)?;
    }
    apply_migrations(conn)?;
    Ok(())
}

impl KvStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn ping(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn multi_get(&self, keys: &[String]) -> StoreResult<Vec<Option<Vec<u8>>>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached("SELECT value FROM kv_entries WHERE key = ?1;")?;
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let value = stmt
                .query_row([key.as_str()], |row| row.get::<_, Vec<u8>>(0))
                .optional()?;
            values.push(value);
        }
        Ok(values)
    }

    fn set_if_present(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE kv_entries SET value = ?2 WHERE key = ?1;",
            params![key, value],
        )?;
        Ok(changed > 0)
    }

    fn scan_members(&self, set: &str, cursor: u64, count: u64) -> StoreResult<ScanPage> {
        let after = i64::try_from(cursor).unwrap_or(i64::MAX);
        let count = count.max(1);
        // One extra row tells us whether another page exists.
        let limit = i64::try_from(count.saturating_add(1)).unwrap_or(i64::MAX);

        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT member_id, member
             FROM kv_set_members
             WHERE set_name = ?1 AND member_id > ?2
             ORDER BY member_id
             LIMIT ?3;",
        )?;
        let mut rows = stmt
            .query_map(params![set, after, limit], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let has_more = rows.len() as u64 > count;
        rows.truncate(count as usize);

        let next_cursor = match rows.last() {
            Some((member_id, _)) if has_more => *member_id as u64,
            _ => 0,
        };

        Ok(ScanPage {
            cursor: next_cursor,
            members: rows.into_iter().map(|(_, member)| member).collect(),
        })
    }

    fn execute(&self, batch: &Batch) -> StoreResult<BatchOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if let Some(key) = batch.absent_guard() {
            let exists = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM kv_entries WHERE key = ?1);",
                [key],
                |row| row.get::<_, bool>(0),
            )?;
            if exists {
                // Dropping the transaction rolls it back.
                return Ok(BatchOutcome::Rejected);
            }
        }

        let mut changed = Vec::with_capacity(batch.commands().len());
        for command in batch.commands() {
            let rows = match command {
                BatchCommand::Put { key, value } => tx.execute(
                    "INSERT INTO kv_entries (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
                    params![key, value],
                )?,
                BatchCommand::Delete { key } => {
                    tx.execute("DELETE FROM kv_entries WHERE key = ?1;", [key])?
                }
                BatchCommand::SetAdd { set, member } => tx.execute(
                    "INSERT OR IGNORE INTO kv_set_members (set_name, member) VALUES (?1, ?2);",
                    params![set, member],
                )?,
                BatchCommand::SetRemove { set, member } => tx.execute(
                    "DELETE FROM kv_set_members WHERE set_name = ?1 AND member = ?2;",
                    params![set, member],
                )?,
            };
            changed.push(rows > 0);
        }

        tx.commit()?;
        Ok(BatchOutcome::Applied(changed))
    }
}
