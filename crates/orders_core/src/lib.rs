//! Core domain logic for the orders service.
//! This crate owns the storage layout and every repository invariant.

pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{Config, ConfigError, StoreLocation};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::category::Category;
pub use model::customer::Customer;
pub use model::order::{now_epoch_ms, LineItem, Order, OrderStatus};
pub use model::product::Product;
pub use model::{Entity, EntityId, ValidationError};
pub use repo::codec::{decode_record, encode_record, CodecError};
pub use repo::indexed_repo::IndexedRepository;
pub use repo::keys::{parse_record_key, record_key};
pub use repo::pager::{walk_pages, Page, PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use repo::{RepoError, RepoResult, Repository};
pub use service::entity_service::{EntityService, ServiceError, ServiceResult};
pub use store::{
    open_redis_store, open_sqlite_store, open_sqlite_store_in_memory, open_store, Batch,
    BatchCommand, BatchOutcome, KvStore, RedisStore, ScanPage, SharedStore, SqliteStore,
    StoreError, StoreResult,
};

pub type CustomerRepository = IndexedRepository<Customer>;
pub type ProductRepository = IndexedRepository<Product>;
pub type CategoryRepository = IndexedRepository<Category>;
pub type OrderRepository = IndexedRepository<Order>;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
