//! Generic indexed repository over a [`KvStore`].
//!
//! # Responsibility
//! - Store each record under `"<label>:<id>"` and index the key in the
//!   entity's plural set.
//! - Serve paged listing by scanning the set and batch-reading the keys.
//!
//! # Invariants
//! - Insert and delete touch primary entry and index in one atomic batch.
//! - Insert never overwrites: an existing key rejects the whole batch.
//! - Update never creates: a missing key is reported as `NotFound`.
//! - Decode failures abort the operation and are logged as integrity issues.

use super::codec::{decode_record, encode_record};
use super::keys::record_key;
use super::pager::{scan_step, Page, PageRequest};
use super::{RepoError, RepoResult, Repository};
use crate::model::{Entity, EntityId};
use crate::store::{Batch, BatchOutcome, SharedStore, StoreError};
use log::{debug, error, warn};
use std::marker::PhantomData;

/// Indexed repository for entity type `E`.
///
/// Cheap to clone; all instances share the injected store handle.
pub struct IndexedRepository<E: Entity> {
    store: SharedStore,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for IndexedRepository<E> {
    fn clone(&self) -> Self {
        Self::new(self.store.clone())
    }
}

impl<E: Entity> IndexedRepository<E> {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    /// Primary key of record `id`.
    pub fn key(id: EntityId) -> String {
        record_key(E::LABEL, id)
    }

    fn encode(record: &E) -> RepoResult<Vec<u8>> {
        encode_record(record).map_err(|source| {
            error!(
                "event=repo_integrity module=repo status=error stage=encode entity={} id={} error={}",
                E::LABEL,
                record.id(),
                source
            );
            RepoError::Encode {
                label: E::LABEL,
                id: record.id(),
                source,
            }
        })
    }

    fn decode(key: &str, bytes: &[u8]) -> RepoResult<E> {
        decode_record(bytes).map_err(|source| {
            error!(
                "event=repo_integrity module=repo status=error stage=decode entity={} key={} error={}",
                E::LABEL,
                key,
                source
            );
            RepoError::Decode {
                key: key.to_string(),
                source,
            }
        })
    }
}

impl<E: Entity> Repository<E> for IndexedRepository<E> {
    fn insert(&self, record: &E) -> RepoResult<()> {
        let id = record.id();
        let key = Self::key(id);
        let value = Self::encode(record)?;

        let batch = Batch::new()
            .require_absent(key.as_str())
            .put(key.as_str(), value)
            .set_add(E::INDEX_SET, key.as_str());

        match self
            .store
            .execute(&batch)
            .map_err(RepoError::store("insert"))?
        {
            BatchOutcome::Applied(_) => {
                debug!(
                    "event=repo_insert module=repo status=ok entity={} id={}",
                    E::LABEL,
                    id
                );
                Ok(())
            }
            BatchOutcome::Rejected => {
                warn!(
                    "event=repo_insert module=repo status=conflict entity={} id={}",
                    E::LABEL,
                    id
                );
                Err(RepoError::AlreadyExists { label: E::LABEL, id })
            }
        }
    }

    fn find_by_id(&self, id: EntityId) -> RepoResult<E> {
        let key = Self::key(id);
        match self.store.get(&key).map_err(RepoError::store("get"))? {
            Some(bytes) => Self::decode(&key, &bytes),
            None => Err(RepoError::NotFound { label: E::LABEL, id }),
        }
    }

    fn update(&self, record: &E) -> RepoResult<()> {
        let id = record.id();
        let key = Self::key(id);
        let value = Self::encode(record)?;

        let replaced = self
            .store
            .set_if_present(&key, &value)
            .map_err(RepoError::store("update"))?;
        if !replaced {
            return Err(RepoError::NotFound { label: E::LABEL, id });
        }

        debug!(
            "event=repo_update module=repo status=ok entity={} id={}",
            E::LABEL,
            id
        );
        Ok(())
    }

    fn delete_by_id(&self, id: EntityId) -> RepoResult<()> {
        let key = Self::key(id);
        // The SREM always runs, so a dangling index member is dropped even
        // when the primary entry is already gone.
        let batch = Batch::new()
            .delete(key.as_str())
            .set_remove(E::INDEX_SET, key.as_str());

        let changed = match self
            .store
            .execute(&batch)
            .map_err(RepoError::store("delete"))?
        {
            BatchOutcome::Applied(changed) => changed,
            BatchOutcome::Rejected => {
                return Err(RepoError::Store {
                    operation: "delete",
                    source: StoreError::UnexpectedReply(
                        "unguarded delete batch was rejected".to_string(),
                    ),
                })
            }
        };

        match changed.as_slice() {
            [true, ..] => {
                debug!(
                    "event=repo_delete module=repo status=ok entity={} id={}",
                    E::LABEL,
                    id
                );
                Ok(())
            }
            [false, true] => {
                warn!(
                    "event=repo_delete module=repo status=dangling_index_removed entity={} id={}",
                    E::LABEL,
                    id
                );
                Err(RepoError::NotFound { label: E::LABEL, id })
            }
            _ => Err(RepoError::NotFound { label: E::LABEL, id }),
        }
    }

    fn find_all(&self, page: PageRequest) -> RepoResult<Page<E>> {
        let scan = scan_step(self.store.as_ref(), E::INDEX_SET, page)
            .map_err(RepoError::store("scan"))?;
        if scan.members.is_empty() {
            return Ok(Page::empty(scan.cursor));
        }

        let values = self
            .store
            .multi_get(&scan.members)
            .map_err(RepoError::store("multi_get"))?;

        let mut items = Vec::with_capacity(values.len());
        for (key, value) in scan.members.iter().zip(values) {
            match value {
                Some(bytes) => items.push(Self::decode(key, &bytes)?),
                // Deleted between scan and read; not part of this page.
                None => warn!(
                    "event=repo_find_all module=repo status=missing_value entity={} key={}",
                    E::LABEL,
                    key
                ),
            }
        }

        debug!(
            "event=repo_find_all module=repo status=ok entity={} offset={} scanned={} returned={} next_cursor={}",
            E::LABEL,
            page.offset,
            scan.members.len(),
            items.len(),
            scan.cursor
        );
        Ok(Page {
            items,
            next_cursor: scan.cursor,
        })
    }
}
