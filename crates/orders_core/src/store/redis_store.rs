//! Remote key-value store on Redis.
//!
//! # Responsibility
//! - Map the store contract onto native Redis commands.
//! - Hold a bounded connection pool for the lifetime of the process.
//!
//! # Invariants
//! - Batches are sent as one MULTI/EXEC pipeline.
//! - Guarded batches WATCH the guard key, so a concurrent writer turns the
//!   EXEC into a rejection instead of a partial write.
//! - A connection that saw any failed round trip never goes back into
//!   service: a timed-out reply may still be in flight on its socket.

use super::{Batch, BatchCommand, BatchOutcome, KvStore, ScanPage, StoreError, StoreResult};
use log::warn;
use r2d2::{ManageConnection, Pool, PooledConnection};
use redis::{Client, Connection, ConnectionLike, ErrorKind, RedisError, RedisResult, Value};
use std::time::Duration;

/// Pooled connection that remembers whether a round trip on it failed.
struct PoolSlot<C> {
    conn: C,
    poisoned: bool,
}

impl<C> PoolSlot<C> {
    fn new(conn: C) -> Self {
        Self {
            conn,
            poisoned: false,
        }
    }

    /// Runs `f` on the connection; any error poisons the slot for good.
    fn run<T>(&mut self, f: impl FnOnce(&mut C) -> RedisResult<T>) -> RedisResult<T> {
        let result = f(&mut self.conn);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}

/// r2d2 manager handing out [`PoolSlot`]s with I/O timeouts already set.
struct RedisManager {
    client: Client,
    io_timeout: Duration,
}

impl ManageConnection for RedisManager {
    type Connection = PoolSlot<Connection>;
    type Error = RedisError;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let conn = self.client.get_connection_with_timeout(self.io_timeout)?;
        conn.set_read_timeout(Some(self.io_timeout))?;
        conn.set_write_timeout(Some(self.io_timeout))?;
        Ok(PoolSlot::new(conn))
    }

    fn is_valid(&self, slot: &mut Self::Connection) -> Result<(), Self::Error> {
        let reply = slot.run(|conn| redis::cmd("PING").query::<String>(conn))?;
        if reply != "PONG" {
            slot.poisoned = true;
            return Err(RedisError::from((
                ErrorKind::ResponseError,
                "PING answered with a foreign reply",
            )));
        }
        Ok(())
    }

    fn has_broken(&self, slot: &mut Self::Connection) -> bool {
        if slot.is_poisoned() {
            warn!("event=store_connection module=store status=discarded backend=redis");
            return true;
        }
        !slot.conn.is_open()
    }
}

/// Redis-backed [`KvStore`] with an r2d2 connection pool.
pub struct RedisStore {
    pool: Pool<RedisManager>,
}

/// Connects to `url` and fills the pool.
///
/// Fails when no connection can be established within `timeout`.
pub fn open_redis_store(url: &str, pool_size: u32, timeout: Duration) -> StoreResult<RedisStore> {
    let manager = RedisManager {
        client: Client::open(url)?,
        io_timeout: timeout,
    };
    let pool = Pool::builder()
        .max_size(pool_size.max(1))
        .connection_timeout(timeout)
        .build(manager)?;
    Ok(RedisStore { pool })
}

impl RedisStore {
    fn connection(&self) -> StoreResult<PooledConnection<RedisManager>> {
        Ok(self.pool.get()?)
    }
}

impl KvStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    fn ping(&self) -> StoreResult<()> {
        let mut slot = self.connection()?;
        slot.run(|conn| redis::cmd("PING").query::<String>(conn))?;
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut slot = self.connection()?;
        let value = slot.run(|conn| redis::cmd("GET").arg(key).query::<Option<Vec<u8>>>(conn))?;
        Ok(value)
    }

    fn multi_get(&self, keys: &[String]) -> StoreResult<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut slot = self.connection()?;
        let values =
            slot.run(|conn| redis::cmd("MGET").arg(keys).query::<Vec<Option<Vec<u8>>>>(conn))?;
        if values.len() != keys.len() {
            slot.poisoned = true;
            return Err(StoreError::UnexpectedReply(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values)
    }

    fn set_if_present(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        let mut slot = self.connection()?;
        let reply = slot.run(|conn| {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("XX")
                .query::<Value>(conn)
        })?;
        Ok(reply_changed(&reply))
    }

    fn scan_members(&self, set: &str, cursor: u64, count: u64) -> StoreResult<ScanPage> {
        let mut slot = self.connection()?;
        let (cursor, members) = slot.run(|conn| {
            redis::cmd("SSCAN")
                .arg(set)
                .arg(cursor)
                .arg("COUNT")
                .arg(count.max(1))
                .query::<(u64, Vec<String>)>(conn)
        })?;
        Ok(ScanPage { cursor, members })
    }

    fn execute(&self, batch: &Batch) -> StoreResult<BatchOutcome> {
        let mut slot = self.connection()?;
        let replies = slot.run(|conn| run_batch(conn, batch))?;

        match replies {
            Some(replies) => Ok(BatchOutcome::Applied(
                replies.iter().map(reply_changed).collect(),
            )),
            // EXEC returns nil only when a watched key changed before commit.
            None if batch.absent_guard().is_some() => {
                warn!("event=store_batch module=store status=conflict backend=redis");
                Ok(BatchOutcome::Rejected)
            }
            None => Err(StoreError::UnexpectedReply(
                "EXEC aborted for an unguarded batch".to_string(),
            )),
        }
    }
}

/// Sends `batch` as MULTI/EXEC. `None` means the guard rejected it, either
/// before sending or through an aborted EXEC.
fn run_batch(conn: &mut Connection, batch: &Batch) -> RedisResult<Option<Vec<Value>>> {
    if let Some(key) = batch.absent_guard() {
        redis::cmd("WATCH").arg(key).query::<()>(conn)?;
        if redis::cmd("EXISTS").arg(key).query::<bool>(conn)? {
            redis::cmd("UNWATCH").query::<()>(conn)?;
            return Ok(None);
        }
    }

    let mut pipe = redis::pipe();
    pipe.atomic();
    for command in batch.commands() {
        match command {
            BatchCommand::Put { key, value } => {
                pipe.cmd("SET").arg(key).arg(value.as_slice());
            }
            BatchCommand::Delete { key } => {
                pipe.cmd("DEL").arg(key);
            }
            BatchCommand::SetAdd { set, member } => {
                pipe.cmd("SADD").arg(set).arg(member);
            }
            BatchCommand::SetRemove { set, member } => {
                pipe.cmd("SREM").arg(set).arg(member);
            }
        }
    }
    pipe.query::<Option<Vec<Value>>>(conn)
}

fn reply_changed(reply: &Value) -> bool {
    match reply {
        Value::Okay => true,
        Value::Status(status) => status == "OK",
        Value::Int(count) => *count > 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{reply_changed, PoolSlot};
    use redis::{ErrorKind, RedisError, Value};
    use std::io;

    #[test]
    fn reply_changed_reads_write_and_count_replies() {
        assert!(reply_changed(&Value::Okay));
        assert!(reply_changed(&Value::Int(1)));
        assert!(!reply_changed(&Value::Int(0)));
        assert!(!reply_changed(&Value::Nil));
    }

    #[test]
    fn successful_round_trips_keep_slot_reusable() {
        let mut slot = PoolSlot::new(0_u32);
        let value = slot
            .run(|calls| {
                *calls += 1;
                Ok::<_, RedisError>(*calls)
            })
            .unwrap();

        assert_eq!(value, 1);
        assert!(!slot.is_poisoned());
    }

    #[test]
    fn timed_out_round_trip_poisons_slot_permanently() {
        let mut slot = PoolSlot::new(());
        let timeout = RedisError::from(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));

        assert!(slot.run(|_| Err::<(), _>(timeout)).is_err());
        assert!(slot.is_poisoned());

        // A later success cannot prove the late reply has been drained.
        slot.run(|_| Ok::<_, RedisError>(())).unwrap();
        assert!(slot.is_poisoned());
    }

    #[test]
    fn reply_type_errors_also_poison_slot() {
        let mut slot = PoolSlot::new(());
        let mismatch = RedisError::from((ErrorKind::TypeError, "expected bulk reply"));

        assert!(slot.run(|_| Err::<(), _>(mismatch)).is_err());
        assert!(slot.is_poisoned());
    }
}
