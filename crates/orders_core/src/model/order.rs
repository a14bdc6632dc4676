use super::{Entity, EntityId, ValidationError};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One product line of an order. `price` is the unit price in minor units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    pub product_id: EntityId,
    pub quantity: u32,
    pub price: i64,
}

/// Customer order. Timestamps are Unix epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub order_id: EntityId,
    pub customer_id: EntityId,
    pub line_items: Vec<LineItem>,
    pub created_at: Option<i64>,
    pub shipped_at: Option<i64>,
    pub completed_at: Option<i64>,
}

/// Fulfilment step an order can move to after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Shipped,
    Completed,
}

impl Order {
    /// Stamps the timestamp for `status`.
    ///
    /// # Errors
    /// - The step was already taken.
    /// - `Completed` is requested before `Shipped`.
    pub fn advance(&mut self, status: OrderStatus, now_ms: i64) -> Result<(), ValidationError> {
        match status {
            OrderStatus::Shipped => {
                if self.shipped_at.is_some() {
                    return Err(ValidationError::new("shipped_at", "order already shipped"));
                }
                self.shipped_at = Some(now_ms);
            }
            OrderStatus::Completed => {
                if self.shipped_at.is_none() {
                    return Err(ValidationError::new(
                        "completed_at",
                        "order must ship before it completes",
                    ));
                }
                if self.completed_at.is_some() {
                    return Err(ValidationError::new("completed_at", "order already completed"));
                }
                self.completed_at = Some(now_ms);
            }
        }
        Ok(())
    }

    /// Sum of `quantity * price` over all lines.
    pub fn total(&self) -> i64 {
        self.line_items
            .iter()
            .map(|item| i64::from(item.quantity).saturating_mul(item.price))
            .fold(0, i64::saturating_add)
    }
}

impl Entity for Order {
    const LABEL: &'static str = "order";
    const INDEX_SET: &'static str = "orders";

    fn id(&self) -> EntityId {
        self.order_id
    }

    fn set_id(&mut self, id: EntityId) {
        self.order_id = id;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(item) = self.line_items.iter().find(|item| item.price < 0) {
            return Err(ValidationError::new(
                "line_items",
                format!("negative price for product {}", item.product_id),
            ));
        }
        if let (Some(shipped), Some(completed)) = (self.shipped_at, self.completed_at) {
            if completed < shipped {
                return Err(ValidationError::new(
                    "completed_at",
                    "must not be earlier than shipped_at",
                ));
            }
        }
        Ok(())
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::{LineItem, Order, OrderStatus};
    use crate::model::Entity;

    #[test]
    fn advance_enforces_ship_before_complete() {
        let mut order = Order::default();
        let err = order.advance(OrderStatus::Completed, 10).unwrap_err();
        assert_eq!(err.field, "completed_at");

        order.advance(OrderStatus::Shipped, 10).unwrap();
        order.advance(OrderStatus::Completed, 20).unwrap();
        assert_eq!(order.shipped_at, Some(10));
        assert_eq!(order.completed_at, Some(20));
        assert!(order.advance(OrderStatus::Shipped, 30).is_err());
    }

    #[test]
    fn total_multiplies_quantity_by_unit_price() {
        let order = Order {
            line_items: vec![
                LineItem {
                    product_id: 1,
                    quantity: 2,
                    price: 150,
                },
                LineItem {
                    product_id: 2,
                    quantity: 1,
                    price: 99,
                },
            ],
            ..Order::default()
        };
        assert_eq!(order.total(), 399);
        assert!(order.validate().is_ok());
    }
}
