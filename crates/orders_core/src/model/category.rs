use super::{Entity, EntityId};
use serde::{Deserialize, Serialize};

/// Product grouping; also embedded by value inside [`super::product::Product`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub category_id: EntityId,
    pub category_name: String,
}

impl Entity for Category {
    const LABEL: &'static str = "category";
    const INDEX_SET: &'static str = "categories";

    fn id(&self) -> EntityId {
        self.category_id
    }

    fn set_id(&mut self, id: EntityId) {
        self.category_id = id;
    }
}
