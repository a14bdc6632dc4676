//! Use-case services above the repository layer.
//!
//! # Responsibility
//! - Assign identifiers and validate drafts before persistence.
//! - Keep the HTTP layer decoupled from repository details.

pub mod entity_service;
