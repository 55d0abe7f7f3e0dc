// Service exports
pub mod cache;
pub mod memory;
pub mod postgres;
pub mod store;

pub use cache::{CacheError, CacheKey, CacheManager, CacheStats};
pub use memory::{Catalog, CatalogFixture, InMemoryStore};
pub use postgres::PostgresStore;
pub use store::{BandValue, CatalogStore, EnterpriseBands, EntityStore, Store, StoreError};
