use super::category::Category;
use super::{Entity, EntityId, ValidationError};
use serde::{Deserialize, Serialize};

/// Sellable item. `price` is in minor currency units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    pub product_id: EntityId,
    pub product_name: String,
    pub price: i64,
    /// Snapshot of the category at write time, not a live reference.
    pub category: Category,
}

impl Entity for Product {
    const LABEL: &'static str = "product";
    const INDEX_SET: &'static str = "products";

    fn id(&self) -> EntityId {
        self.product_id
    }

    fn set_id(&mut self, id: EntityId) {
        self.product_id = id;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.price < 0 {
            return Err(ValidationError::new("price", "must not be negative"));
        }
        Ok(())
    }
}
