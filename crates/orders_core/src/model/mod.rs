//! Entity types persisted through the indexed repository.
//!
//! # Responsibility
//! - Declare the per-entity storage identity (label, index set, id).
//! - Own field-level validation applied on encode and decode.
//!
//! # Invariants
//! - `LABEL` is unique per entity type; it prefixes every primary key.
//! - `INDEX_SET` is the plural label naming the membership set.
//! - Every field defaults when absent so older stored values still decode.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod category;
pub mod customer;
pub mod order;
pub mod product;

/// Writer-assigned record identifier.
pub type EntityId = u64;

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid `{}`: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}

/// A record type stored under `"<LABEL>:<id>"` and indexed in `INDEX_SET`.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Singular label used as key prefix, e.g. `customer`.
    const LABEL: &'static str;
    /// Plural label naming the index set, e.g. `customers`.
    const INDEX_SET: &'static str;

    fn id(&self) -> EntityId;

    /// Overwrites the identifier; used when the writer assigns identity.
    fn set_id(&mut self, id: EntityId);

    /// Checks fields that cannot be represented faithfully in storage.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
