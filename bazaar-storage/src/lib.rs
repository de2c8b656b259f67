//! Bazaar Storage - Store Traits and Cache Layer
//!
//! Defines the boundary to the stores of record (catalog and cart), the
//! key-value cache backends, and the read-through cache services built on
//! top of them.

pub mod cache;
pub mod cooldown;
pub mod inventory;
pub mod telemetry;

pub use cache::{
    CacheBackendConfig, CacheKey, CacheMonitor, CacheStatistics, CartCacheService,
    InMemoryKeyValueStore, KeyValueStore, LmdbKeyValueStore, ProductCacheService,
};
pub use cooldown::OrderCooldown;
pub use inventory::StockSync;

#[cfg(feature = "redis")]
pub use cache::redis_store::{RedisConfig, RedisKeyValueStore};

use bazaar_core::{
    BazaarResult, CartLine, CustomerId, ProductId, ProductRecord, StorageError,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Catalog store of record.
///
/// Implementations must be thread-safe; the cache services call them from
/// whichever request thread missed the cache.
pub trait CatalogStore: Send + Sync {
    fn find_by_id(&self, id: &ProductId) -> BazaarResult<Option<ProductRecord>>;

    /// Records for the ids that exist, in no particular order. Unknown ids are skipped.
    fn find_all_by_id(&self, ids: &[ProductId]) -> BazaarResult<Vec<ProductRecord>>;

    /// Every product in `category` except `excluded`.
    fn find_by_category_excluding(
        &self,
        category: &str,
        excluded: &ProductId,
    ) -> BazaarResult<Vec<ProductRecord>>;

    /// Insert or replace a record.
    fn save(&self, product: &ProductRecord) -> BazaarResult<()>;
}

/// Cart store of record.
pub trait CartStore: Send + Sync {
    fn lines(&self, customer: &CustomerId) -> BazaarResult<Vec<CartLine>>;

    /// Insert or replace the line for `line.product_id`.
    fn upsert_line(&self, customer: &CustomerId, line: CartLine) -> BazaarResult<()>;

    fn remove_lines(&self, customer: &CustomerId, product_ids: &[ProductId]) -> BazaarResult<()>;
}

// =============================================================================
// IN-MEMORY STORES
// =============================================================================

/// In-memory catalog for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<BTreeMap<ProductId, ProductRecord>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = ProductRecord>) -> Self {
        let catalog = Self::new();
        if let Ok(mut map) = catalog.products.write() {
            for p in products {
                map.insert(p.id.clone(), p);
            }
        }
        catalog
    }

    pub fn remove(&self, id: &ProductId) -> BazaarResult<Option<ProductRecord>> {
        let mut products = self.products.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(products.remove(id))
    }

    pub fn len(&self) -> usize {
        self.products.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CatalogStore for InMemoryCatalog {
    fn find_by_id(&self, id: &ProductId) -> BazaarResult<Option<ProductRecord>> {
        let products = self.products.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(products.get(id).cloned())
    }

    fn find_all_by_id(&self, ids: &[ProductId]) -> BazaarResult<Vec<ProductRecord>> {
        let products = self.products.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    fn find_by_category_excluding(
        &self,
        category: &str,
        excluded: &ProductId,
    ) -> BazaarResult<Vec<ProductRecord>> {
        let products = self.products.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(products
            .values()
            .filter(|p| p.category == category && &p.id != excluded)
            .cloned()
            .collect())
    }

    fn save(&self, product: &ProductRecord) -> BazaarResult<()> {
        let mut products = self.products.write().map_err(|_| StorageError::LockPoisoned)?;
        products.insert(product.id.clone(), product.clone());
        Ok(())
    }
}

/// In-memory cart store keyed by customer.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    carts: Arc<RwLock<HashMap<CustomerId, Vec<CartLine>>>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CartStore for InMemoryCartStore {
    fn lines(&self, customer: &CustomerId) -> BazaarResult<Vec<CartLine>> {
        let carts = self.carts.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(carts.get(customer).cloned().unwrap_or_default())
    }

    fn upsert_line(&self, customer: &CustomerId, line: CartLine) -> BazaarResult<()> {
        let mut carts = self.carts.write().map_err(|_| StorageError::LockPoisoned)?;
        let lines = carts.entry(customer.clone()).or_default();
        match lines.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => existing.quantity = line.quantity,
            None => lines.push(line),
        }
        Ok(())
    }

    fn remove_lines(&self, customer: &CustomerId, product_ids: &[ProductId]) -> BazaarResult<()> {
        let mut carts = self.carts.write().map_err(|_| StorageError::LockPoisoned)?;
        if let Some(lines) = carts.get_mut(customer) {
            lines.retain(|l| !product_ids.contains(&l.product_id));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
