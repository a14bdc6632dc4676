//! Schema registry for the embedded SQLite store.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied version is mirrored to `PRAGMA user_version`.

use super::{StoreError, StoreResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("sql/0001_kv_init.sql"),
}];

/// Returns the latest store schema version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings the store tables up to [`latest_version`] in one transaction.
///
/// Returns the version the store was at before this call.
pub fn apply_migrations(conn: &mut Connection) -> StoreResult<u32> {
    let found: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let latest = latest_version();
    if found > latest {
        return Err(StoreError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }

    let pending = MIGRATIONS
        .iter()
        .skip_while(|migration| migration.version <= found)
        .collect::<Vec<_>>();
    if let Some(target) = pending.last() {
        let tx = conn.transaction()?;
        for migration in &pending {
            tx.execute_batch(migration.sql)?;
        }
        tx.pragma_update(None, "user_version", target.version)?;
        tx.commit()?;
        info!(
            "event=store_migrate module=store status=ok from_version={} to_version={} applied={}",
            found,
            target.version,
            pending.len()
        );
    }

    Ok(found)
}
