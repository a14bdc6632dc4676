//! Primary key layout: `"<label>:<decimal id>"`.

use crate::model::EntityId;

/// Builds the primary key for record `id` of entity `label`.
pub fn record_key(label: &str, id: EntityId) -> String {
    format!("{label}:{id}")
}

/// Inverse of [`record_key`]; `None` when `key` belongs to another label or
/// carries a non-decimal id.
pub fn parse_record_key(label: &str, key: &str) -> Option<EntityId> {
    let id = key.strip_prefix(label)?.strip_prefix(':')?;
    if id.is_empty() || !id.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}
