//! Key-value store contract and backend bootstrap.
//!
//! # Responsibility
//! - Define the minimal store surface the repository layer consumes.
//! - Provide SQLite (embedded) and Redis (remote) implementations.
//!
//! # Invariants
//! - `execute` applies every command of a batch or none of them.
//! - A guarded batch is rejected without side effects when its guard fails.
//! - `scan_members` returns cursor `0` once the scan has visited every member.

use crate::config::{Config, StoreLocation};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub mod migrations;
mod redis_store;
mod sqlite_store;

pub use redis_store::{open_redis_store, RedisStore};
pub use sqlite_store::{open_sqlite_store, open_sqlite_store_in_memory, SqliteStore};

pub type StoreResult<T> = Result<T, StoreError>;

/// Process-wide store handle shared by every repository instance.
pub type SharedStore = Arc<dyn KvStore>;

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Redis(redis::RedisError),
    Pool(r2d2::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    LockPoisoned,
    UnexpectedReply(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Redis(err) => write!(f, "{err}"),
            Self::Pool(err) => write!(f, "connection pool: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "store schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::LockPoisoned => write!(f, "store connection lock poisoned"),
            Self::UnexpectedReply(details) => write!(f, "unexpected store reply: {details}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Redis(err) => Some(err),
            Self::Pool(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::LockPoisoned => None,
            Self::UnexpectedReply(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(value: redis::RedisError) -> Self {
        Self::Redis(value)
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(value: r2d2::Error) -> Self {
        Self::Pool(value)
    }
}

/// One write inside an atomic [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchCommand {
    /// Unconditional string write.
    Put { key: String, value: Vec<u8> },
    /// Single-key delete.
    Delete { key: String },
    /// Adds `member` to set `set`.
    SetAdd { set: String, member: String },
    /// Removes `member` from set `set`.
    SetRemove { set: String, member: String },
}

/// All-or-nothing group of writes, optionally guarded by key absence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    require_absent: Option<String>,
    commands: Vec<BatchCommand>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects the whole batch when `key` already exists at commit time.
    pub fn require_absent(mut self, key: impl Into<String>) -> Self {
        self.require_absent = Some(key.into());
        self
    }

    pub fn put(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.commands.push(BatchCommand::Put {
            key: key.into(),
            value,
        });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.commands.push(BatchCommand::Delete { key: key.into() });
        self
    }

    pub fn set_add(mut self, set: impl Into<String>, member: impl Into<String>) -> Self {
        self.commands.push(BatchCommand::SetAdd {
            set: set.into(),
            member: member.into(),
        });
        self
    }

    pub fn set_remove(mut self, set: impl Into<String>, member: impl Into<String>) -> Self {
        self.commands.push(BatchCommand::SetRemove {
            set: set.into(),
            member: member.into(),
        });
        self
    }

    pub fn absent_guard(&self) -> Option<&str> {
        self.require_absent.as_deref()
    }

    pub fn commands(&self) -> &[BatchCommand] {
        &self.commands
    }
}

/// Result of [`KvStore::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Batch committed; one "changed something" flag per command, in order.
    Applied(Vec<bool>),
    /// Guard failed; nothing was written.
    Rejected,
}

/// One step of an incremental set scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor to resume from; `0` once the scan is complete.
    pub cursor: u64,
    pub members: Vec<String>,
}

/// Store operations consumed by the repository layer.
///
/// Implementations must be safe to share across threads; each call is one
/// bounded round trip.
pub trait KvStore: Send + Sync {
    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;
    /// Verifies the store is reachable.
    fn ping(&self) -> StoreResult<()>;
    /// Reads one value.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
    /// Reads many values in one round trip, preserving key order.
    fn multi_get(&self, keys: &[String]) -> StoreResult<Vec<Option<Vec<u8>>>>;
    /// Overwrites `key` only when it already exists. Returns whether it did.
    fn set_if_present(&self, key: &str, value: &[u8]) -> StoreResult<bool>;
    /// Visits up to `count` members of `set`, starting at `cursor`.
    fn scan_members(&self, set: &str, cursor: u64, count: u64) -> StoreResult<ScanPage>;
    /// Applies a batch atomically.
    fn execute(&self, batch: &Batch) -> StoreResult<BatchOutcome>;
}

/// Opens the backend selected by `config.store` and verifies it responds.
///
/// # Side effects
/// - Emits `store_open` logging events with backend and duration.
pub fn open_store(config: &Config) -> StoreResult<SharedStore> {
    let started_at = Instant::now();
    let store: StoreResult<SharedStore> = match &config.store {
        StoreLocation::Redis(url) => {
            open_redis_store(url, config.store_pool_size, config.store_timeout)
                .map(|store| Arc::new(store) as SharedStore)
        }
        StoreLocation::SqliteFile(path) => open_sqlite_store(path, config.store_timeout)
            .map(|store| Arc::new(store) as SharedStore),
        StoreLocation::SqliteMemory => {
            open_sqlite_store_in_memory().map(|store| Arc::new(store) as SharedStore)
        }
    };

    match store.and_then(|store| store.ping().map(|()| store)) {
        Ok(store) => {
            info!(
                "event=store_open module=store status=ok backend={} duration_ms={}",
                store.backend(),
                started_at.elapsed().as_millis()
            );
            Ok(store)
        }
        Err(err) => {
            error!(
                "event=store_open module=store status=error backend={} duration_ms={} error={}",
                config.store.backend(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Batch, BatchCommand};

    #[test]
    fn batch_builder_keeps_command_order_and_guard() {
        let batch = Batch::new()
            .require_absent("customer:1")
            .put("customer:1", b"{}".to_vec())
            .set_add("customers", "customer:1");

        assert_eq!(batch.absent_guard(), Some("customer:1"));
        assert_eq!(
            batch.commands(),
            &[
                BatchCommand::Put {
                    key: "customer:1".to_string(),
                    value: b"{}".to_vec(),
                },
                BatchCommand::SetAdd {
                    set: "customers".to_string(),
                    member: "customer:1".to_string(),
                },
            ]
        );
    }

    #[test]
    fn unguarded_batch_has_no_guard() {
        let batch = Batch::new().delete("product:7");
        assert_eq!(batch.absent_guard(), None);
    }
}
