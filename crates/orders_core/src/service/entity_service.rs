//! Generic CRUD service for any [`Entity`].
//!
//! # Responsibility
//! - Draw random identifiers and retry when Insert reports a collision.
//! - Validate drafts and edits so bad input fails before touching the store.
//!
//! # Invariants
//! - Drafts never choose their own id; the service overwrites it.
//! - `update_with` pins the id of the loaded record; edits cannot move it.

use crate::model::{Entity, EntityId, ValidationError};
use crate::repo::pager::{walk_pages, Page, PageRequest};
use crate::repo::{RepoError, Repository};
use log::warn;
use rand::Rng;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

/// Identifier draws per create before giving up on collisions.
pub const MAX_ID_ATTEMPTS: usize = 4;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    /// Input rejected before any store call.
    Invalid(ValidationError),
    /// Repository failure, passed through unchanged.
    Repo(RepoError),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Repo(err) if err.is_not_found())
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

type IdSource = Box<dyn Fn() -> EntityId + Send + Sync>;

/// Use-case wrapper around a repository for entity `E`.
pub struct EntityService<E, R> {
    repo: R,
    next_id: IdSource,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, R: Repository<E>> EntityService<E, R> {
    /// Service drawing uniformly random non-zero ids.
    pub fn new(repo: R) -> Self {
        Self::with_id_source(repo, random_id)
    }

    /// Service with a caller-supplied id generator.
    pub fn with_id_source(repo: R, next_id: impl Fn() -> EntityId + Send + Sync + 'static) -> Self {
        Self {
            repo,
            next_id: Box::new(next_id),
            _entity: PhantomData,
        }
    }

    /// Validates `draft`, assigns a fresh id and inserts it.
    ///
    /// # Errors
    /// - `Invalid` when the draft fails validation.
    /// - `Repo(AlreadyExists)` after [`MAX_ID_ATTEMPTS`] colliding draws.
    /// - Any other repository error unchanged.
    pub fn create(&self, mut draft: E) -> ServiceResult<E> {
        draft.validate()?;

        let mut attempt = 1;
        loop {
            draft.set_id((self.next_id)());
            match self.repo.insert(&draft) {
                Ok(()) => return Ok(draft),
                Err(RepoError::AlreadyExists { label, id }) if attempt < MAX_ID_ATTEMPTS => {
                    warn!(
                        "event=id_collision module=service status=retry entity={} id={} attempt={}",
                        label, id, attempt
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub fn get(&self, id: EntityId) -> ServiceResult<E> {
        Ok(self.repo.find_by_id(id)?)
    }

    /// One page of the index walk; see [`crate::repo::pager`].
    pub fn list(&self, page: PageRequest) -> ServiceResult<Page<E>> {
        Ok(self.repo.find_all(page.normalized())?)
    }

    /// Every record, following cursors until the walk completes.
    pub fn list_all(&self, page_size: u64) -> ServiceResult<Vec<E>> {
        Ok(walk_pages(page_size, |page| self.repo.find_all(page.normalized()))?)
    }

    /// Loads record `id`, applies `edit`, validates and writes it back.
    pub fn update_with(
        &self,
        id: EntityId,
        edit: impl FnOnce(&mut E) -> Result<(), ValidationError>,
    ) -> ServiceResult<E> {
        let mut record = self.repo.find_by_id(id)?;
        edit(&mut record)?;
        record.set_id(id);
        record.validate()?;
        self.repo.update(&record)?;
        Ok(record)
    }

    pub fn delete(&self, id: EntityId) -> ServiceResult<()> {
        Ok(self.repo.delete_by_id(id)?)
    }
}

fn random_id() -> EntityId {
    rand::thread_rng().gen_range(1..=EntityId::MAX)
}
