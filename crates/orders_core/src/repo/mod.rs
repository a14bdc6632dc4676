//! Repository layer: one indexed repository pattern shared by every entity.
//!
//! # Responsibility
//! - Define the CRUD + paged listing contract the service layer consumes.
//! - Keep key layout, record encoding and scan paging behind that contract.
//!
//! # Invariants
//! - A primary entry exists iff its key is a member of the entity index set.
//! - Repository APIs return semantic errors (`NotFound`, `AlreadyExists`) in
//!   addition to store and codec failures, and never swallow either.

use crate::model::EntityId;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod codec;
pub mod indexed_repo;
pub mod keys;
pub mod pager;

use self::codec::CodecError;
use self::pager::{Page, PageRequest};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    /// No primary entry for the id.
    NotFound { label: &'static str, id: EntityId },
    /// Insert found an existing primary entry for the id.
    AlreadyExists { label: &'static str, id: EntityId },
    /// The record could not be represented in storage.
    Encode {
        label: &'static str,
        id: EntityId,
        source: CodecError,
    },
    /// A stored value no longer matches the current schema.
    Decode { key: String, source: CodecError },
    /// Backend failure during `operation`.
    Store {
        operation: &'static str,
        source: StoreError,
    },
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn store(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { operation, source }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { label, id } => write!(f, "{label} does not exist: {id}"),
            Self::AlreadyExists { label, id } => write!(f, "{label} already exists: {id}"),
            Self::Encode { label, id, source } => {
                write!(f, "failed to encode {label} {id}: {source}")
            }
            Self::Decode { key, source } => write!(f, "failed to decode `{key}`: {source}"),
            Self::Store { operation, source } => write!(f, "{operation} failed: {source}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound { .. } | Self::AlreadyExists { .. } => None,
            Self::Encode { source, .. } | Self::Decode { source, .. } => Some(source),
            Self::Store { source, .. } => Some(source),
        }
    }
}

/// Persistence contract for one entity type.
pub trait Repository<E> {
    /// Stores a new record and indexes it. Fails with `AlreadyExists` when the
    /// id is taken; nothing is written in that case.
    fn insert(&self, record: &E) -> RepoResult<()>;
    fn find_by_id(&self, id: EntityId) -> RepoResult<E>;
    /// Replaces an existing record. Fails with `NotFound` without creating it.
    fn update(&self, record: &E) -> RepoResult<()>;
    /// Removes the record and its index membership together.
    fn delete_by_id(&self, id: EntityId) -> RepoResult<()>;
    /// One scan step over the index; see [`pager`] for cursor rules.
    ///
    /// `next_cursor` is the store's scan cursor passed through unchanged,
    /// so an empty page may still carry a nonzero cursor.
    fn find_all(&self, page: PageRequest) -> RepoResult<Page<E>>;
}
