use super::{Entity, EntityId, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@<>()\[\],;:]+@[^\s@<>()\[\],;:]+\.[^\s@<>()\[\],;:]+$")
        .expect("valid email regex")
});

/// Registered buyer.
///
/// `is_deleted` is a caller-managed flag; the repository deletes records for
/// real and never looks at it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Customer {
    pub customer_id: EntityId,
    pub name: String,
    pub surname: String,
    /// Empty means "not provided"; otherwise must be `local@domain.tld`.
    pub email: String,
    pub is_deleted: bool,
}

impl Entity for Customer {
    const LABEL: &'static str = "customer";
    const INDEX_SET: &'static str = "customers";

    fn id(&self) -> EntityId {
        self.customer_id
    }

    fn set_id(&mut self, id: EntityId) {
        self.customer_id = id;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if !self.email.is_empty() && !EMAIL_RE.is_match(&self.email) {
            return Err(ValidationError::new(
                "email",
                format!("`{}` is not an e-mail address", self.email),
            ));
        }
        Ok(())
    }
}
