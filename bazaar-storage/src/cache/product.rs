//! Read-through cache for product summaries.

use std::sync::Arc;
use std::time::Duration;

use bazaar_core::{BazaarResult, CacheConfig, ProductId, ProductSummary};

use super::key::CacheKey;
use super::read_through::{self, CacheRead};
use super::store::KeyValueStore;
use crate::CatalogStore;

/// Product cache in front of the catalog.
///
/// Reads never fail because of the cache: store errors and undecodable
/// entries fall through to the catalog, and only catalog failures reach
/// the caller.
pub struct ProductCacheService<S: ?Sized, C: ?Sized> {
    store: Arc<S>,
    catalog: Arc<C>,
    ttl: Duration,
}

impl<S, C> ProductCacheService<S, C>
where
    S: KeyValueStore + ?Sized,
    C: CatalogStore + ?Sized,
{
    pub fn new(store: Arc<S>, catalog: Arc<C>, config: &CacheConfig) -> Self {
        Self {
            store,
            catalog,
            ttl: config.product_ttl,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn catalog(&self) -> &Arc<C> {
        &self.catalog
    }

    /// Cached summary, else the catalog record (written through).
    ///
    /// `Ok(None)` only when the catalog has no such product.
    pub fn get(&self, id: &ProductId) -> BazaarResult<Option<ProductSummary>> {
        let key = CacheKey::product(id).encode();
        if let CacheRead::Hit(summary) = read_through::read::<ProductSummary, _>(&*self.store, &key)
        {
            tracing::debug!(product_id = %id, "Product cache hit");
            return Ok(Some(summary));
        }

        tracing::debug!(product_id = %id, "Product cache miss");
        let Some(record) = self.catalog.find_by_id(id)? else {
            return Ok(None);
        };
        let summary = ProductSummary::from_record(&record);
        read_through::write(&*self.store, &key, &summary, self.ttl);
        Ok(Some(summary))
    }

    /// Cache-only lookup; never touches the catalog.
    pub fn peek(&self, id: &ProductId) -> Option<ProductSummary> {
        read_through::read(&*self.store, &CacheKey::product(id).encode()).into_option()
    }

    pub fn put(&self, summary: &ProductSummary) {
        let key = CacheKey::product(&summary.id).encode();
        read_through::write(&*self.store, &key, summary, self.ttl);
    }

    /// Replace the entry for `id`: evict, then write `summary` under `id`.
    pub fn update(&self, id: &ProductId, summary: &ProductSummary) {
        let key = CacheKey::product(id).encode();
        read_through::delete(&*self.store, &key);
        read_through::write(&*self.store, &key, summary, self.ttl);
    }

    pub fn evict(&self, id: &ProductId) {
        read_through::delete(&*self.store, &CacheKey::product(id).encode());
    }

    /// Rewrite the cached stock level with a fresh TTL. No-op on a miss.
    pub fn patch_stock(&self, id: &ProductId, stock: i32) {
        let key = CacheKey::product(id).encode();
        match read_through::read::<ProductSummary, _>(&*self.store, &key) {
            CacheRead::Hit(mut summary) => {
                summary.stock = stock;
                read_through::write(&*self.store, &key, &summary, self.ttl);
                tracing::debug!(product_id = %id, stock, "Patched cached product stock");
            }
            _ => tracing::debug!(product_id = %id, "No cached product to patch"),
        }
    }

    pub fn exists(&self, id: &ProductId) -> bool {
        let key = CacheKey::product(id).encode();
        match self.store.exists(&key) {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache existence probe failed");
                false
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
