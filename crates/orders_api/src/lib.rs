//! HTTP surface for the orders service.
//!
//! # Responsibility
//! - Expose CRUD routes for customers, products, categories and orders.
//! - Translate service errors into status codes.
//!
//! # Invariants
//! - Request bodies never choose record ids.
//! - Repository calls run on the blocking pool under the request deadline.

pub mod api;
pub mod error;
pub mod resource;
pub mod routes;

pub use error::ApiError;
pub use resource::Resource;
pub use routes::router;

use orders_core::SharedStore;
use std::time::Duration;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(store: SharedStore, request_timeout: Duration) -> Self {
        Self {
            store,
            request_timeout,
        }
    }
}
