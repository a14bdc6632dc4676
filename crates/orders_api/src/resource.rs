//! Request bodies and their mapping onto entities.
//!
//! # Invariants
//! - Create bodies carry no id; the service assigns one.
//! - Update bodies only touch the fields they name.

use orders_core::{
    now_epoch_ms, Category, Customer, Entity, LineItem, Order, OrderStatus, Product,
    ValidationError,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Entity exposed as an HTTP resource.
pub trait Resource: Entity {
    type CreateBody: DeserializeOwned + Send + 'static;
    type UpdateBody: DeserializeOwned + Send + 'static;

    /// Builds a draft record from a create body.
    fn from_create(body: Self::CreateBody) -> Self;

    /// Applies an update body to a loaded record.
    fn apply_update(&mut self, body: Self::UpdateBody) -> Result<(), ValidationError>;
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomer {
    pub name: String,
    pub surname: String,
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub is_deleted: Option<bool>,
}

impl Resource for Customer {
    type CreateBody = CreateCustomer;
    type UpdateBody = UpdateCustomer;

    fn from_create(body: CreateCustomer) -> Self {
        Self {
            customer_id: 0,
            name: body.name,
            surname: body.surname,
            email: body.email,
            is_deleted: false,
        }
    }

    fn apply_update(&mut self, body: UpdateCustomer) -> Result<(), ValidationError> {
        if let Some(name) = body.name {
            self.name = name;
        }
        if let Some(surname) = body.surname {
            self.surname = surname;
        }
        if let Some(email) = body.email {
            self.email = email;
        }
        if let Some(is_deleted) = body.is_deleted {
            self.is_deleted = is_deleted;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryBody {
    pub category_name: String,
}

impl Resource for Category {
    type CreateBody = CategoryBody;
    type UpdateBody = CategoryBody;

    fn from_create(body: CategoryBody) -> Self {
        Self {
            category_id: 0,
            category_name: body.category_name,
        }
    }

    fn apply_update(&mut self, body: CategoryBody) -> Result<(), ValidationError> {
        self.category_name = body.category_name;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub product_name: String,
    pub price: i64,
    #[serde(default)]
    pub category: Category,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProduct {
    pub product_name: Option<String>,
    pub price: Option<i64>,
    pub category: Option<Category>,
}

impl Resource for Product {
    type CreateBody = CreateProduct;
    type UpdateBody = UpdateProduct;

    fn from_create(body: CreateProduct) -> Self {
        Self {
            product_id: 0,
            product_name: body.product_name,
            price: body.price,
            category: body.category,
        }
    }

    fn apply_update(&mut self, body: UpdateProduct) -> Result<(), ValidationError> {
        if let Some(product_name) = body.product_name {
            self.product_name = product_name;
        }
        if let Some(price) = body.price {
            self.price = price;
        }
        if let Some(category) = body.category {
            self.category = category;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub customer_id: u64,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrder {
    pub status: OrderStatus,
}

impl Resource for Order {
    type CreateBody = CreateOrder;
    type UpdateBody = UpdateOrder;

    fn from_create(body: CreateOrder) -> Self {
        Self {
            order_id: 0,
            customer_id: body.customer_id,
            line_items: body.line_items,
            created_at: Some(now_epoch_ms()),
            shipped_at: None,
            completed_at: None,
        }
    }

    fn apply_update(&mut self, body: UpdateOrder) -> Result<(), ValidationError> {
        self.advance(body.status, now_epoch_ms())
    }
}
