//! Read-through cache layer over a key-value store.
//!
//! The cache is a derived view of the catalog and cart stores. Entries
//! expire on their own (24h for products, 12h for cart lines) or are
//! evicted by the services when the store of record changes.
//!
//! # Failure Model
//!
//! The services in this module never surface cache failures. A store that
//! cannot be reached reads as a miss; an entry that cannot be decoded is
//! deleted and reads as a miss. Only failures of the store of record reach
//! the caller.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(InMemoryKeyValueStore::new());
//! let config = CacheConfig::default();
//! let products = Arc::new(ProductCacheService::new(store.clone(), catalog, &config));
//! let carts = CartCacheService::new(products.clone(), &config);
//!
//! carts.cache_on_add(&customer, &product_id, 2)?;
//! let lines = carts.get_all(&customer);
//! ```

pub mod backend;
pub mod cart;
pub mod codec;
pub mod glob;
pub mod key;
pub mod lmdb;
pub mod memory;
pub mod monitor;
pub mod product;
pub mod read_through;
pub mod store;

#[cfg(feature = "redis")]
pub mod redis_store;

pub use backend::CacheBackendConfig;
pub use cart::CartCacheService;
pub use codec::{CacheableValue, SCHEMA_VERSION};
pub use glob::GlobPattern;
pub use key::CacheKey;
pub use lmdb::{LmdbCacheError, LmdbKeyValueStore};
pub use memory::InMemoryKeyValueStore;
pub use monitor::{CacheMonitor, CacheStatistics};
pub use product::ProductCacheService;
pub use read_through::CacheRead;
pub use store::{CacheResult, KeyValueStore};
