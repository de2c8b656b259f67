//! Per-customer cart line cache.

use std::sync::Arc;
use std::time::Duration;

use bazaar_core::{
    BazaarResult, CacheConfig, CachedCartItem, CartLine, CustomerId, ProductId, ProductSummary,
};
use chrono::Utc;

use super::key::CacheKey;
use super::product::ProductCacheService;
use super::read_through::{self, CacheRead};
use super::store::KeyValueStore;
use crate::{CartStore, CatalogStore};

/// Cache of cart lines, one key per (customer, product).
///
/// Each entry embeds a full product summary so a cart can be rendered from
/// cache alone; [`patch_stock`](Self::patch_stock) keeps the embedded stock
/// in step with the catalog.
pub struct CartCacheService<S: ?Sized, C: ?Sized> {
    products: Arc<ProductCacheService<S, C>>,
    ttl: Duration,
}

impl<S, C> CartCacheService<S, C>
where
    S: KeyValueStore + ?Sized,
    C: CatalogStore + ?Sized,
{
    pub fn new(products: Arc<ProductCacheService<S, C>>, config: &CacheConfig) -> Self {
        Self {
            products,
            ttl: config.cart_ttl,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn products(&self) -> &Arc<ProductCacheService<S, C>> {
        &self.products
    }

    fn store(&self) -> &S {
        self.products.store().as_ref()
    }

    /// Cache a line after it was added to the cart store.
    ///
    /// Returns whether an entry was written: unknown products are skipped
    /// and a zero quantity removes the entry instead.
    pub fn cache_on_add(
        &self,
        customer: &CustomerId,
        product_id: &ProductId,
        quantity: u32,
    ) -> BazaarResult<bool> {
        if quantity == 0 {
            self.remove(customer, product_id);
            return Ok(false);
        }

        let Some(product) = self.products.get(product_id)? else {
            tracing::debug!(
                customer_id = %customer,
                product_id = %product_id,
                "Skipping cart cache for unknown product"
            );
            return Ok(false);
        };

        let item = CachedCartItem::new(product, quantity, now_ms());
        let key = CacheKey::cart_item(customer, product_id).encode();
        Ok(read_through::write(self.store(), &key, &item, self.ttl))
    }

    pub fn get(&self, customer: &CustomerId, product_id: &ProductId) -> Option<CachedCartItem> {
        read_through::read(self.store(), &CacheKey::cart_item(customer, product_id).encode())
            .into_option()
    }

    /// Every decodable line of the customer's cart, ordered by key.
    /// Corrupt entries are deleted and left out.
    pub fn get_all(&self, customer: &CustomerId) -> Vec<CachedCartItem> {
        let mut keys = self.customer_keys(customer);
        keys.sort();
        keys.iter()
            .filter_map(|key| {
                read_through::read::<CachedCartItem, _>(self.store(), key).into_option()
            })
            .collect()
    }

    /// Set a new quantity with a fresh TTL. No-op if the line is not cached;
    /// zero removes it.
    pub fn update_quantity(&self, customer: &CustomerId, product_id: &ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove(customer, product_id);
            return;
        }

        let key = CacheKey::cart_item(customer, product_id).encode();
        let cached: CacheRead<CachedCartItem> = read_through::read(self.store(), &key);
        if let CacheRead::Hit(mut item) = cached {
            item.quantity = quantity;
            item.timestamp = now_ms();
            read_through::write(self.store(), &key, &item, self.ttl);
        }
    }

    pub fn remove(&self, customer: &CustomerId, product_id: &ProductId) {
        read_through::delete(self.store(), &CacheKey::cart_item(customer, product_id).encode());
    }

    /// Drop the customer's whole cart namespace. Returns how many keys went.
    pub fn clear(&self, customer: &CustomerId) -> u64 {
        let keys = self.customer_keys(customer);
        read_through::delete_many(self.store(), &keys)
    }

    /// Drop the given lines, e.g. the ones just ordered.
    pub fn remove_many(&self, customer: &CustomerId, product_ids: &[ProductId]) -> u64 {
        let keys: Vec<String> = product_ids
            .iter()
            .map(|p| CacheKey::cart_item(customer, p).encode())
            .collect();
        read_through::delete_many(self.store(), &keys)
    }

    pub fn contains(&self, customer: &CustomerId, product_id: &ProductId) -> bool {
        let key = CacheKey::cart_item(customer, product_id).encode();
        match self.store().exists(&key) {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache existence probe failed");
                false
            }
        }
    }

    /// Rewrite the embedded stock of `product_id` in every customer's cart.
    /// Returns how many entries were patched.
    pub fn patch_stock(&self, product_id: &ProductId, stock: i32) -> usize {
        let pattern = CacheKey::product_in_carts_pattern(product_id);
        let keys = read_through::keys(self.store(), &pattern);
        let mut patched = 0;
        for key in &keys {
            let owned = matches!(
                CacheKey::parse(key),
                Some(CacheKey::CartItem { ref product, .. }) if product == product_id
            );
            if !owned {
                continue;
            }
            let cached: CacheRead<CachedCartItem> = read_through::read(self.store(), key);
            if let CacheRead::Hit(mut item) = cached {
                item.product.stock = stock;
                item.timestamp = now_ms();
                if read_through::write(self.store(), key, &item, self.ttl) {
                    patched += 1;
                }
            }
        }
        tracing::debug!(product_id = %product_id, stock, patched, "Patched cart stock");
        patched
    }

    /// Keys of the customer's namespace. The scan is re-checked against the
    /// parsed key so only lines owned by exactly this customer come back.
    fn customer_keys(&self, customer: &CustomerId) -> Vec<String> {
        read_through::keys(self.store(), &CacheKey::customer_cart_pattern(customer))
            .into_iter()
            .filter(|key| {
                matches!(
                    CacheKey::parse(key),
                    Some(CacheKey::CartItem { customer: ref owner, .. }) if owner == customer
                )
            })
            .collect()
    }

    /// Rebuild the customer's namespace from the cart store's lines.
    /// Returns how many lines were cached.
    pub fn sync_from_store(
        &self,
        customer: &CustomerId,
        lines: &[CartLine],
    ) -> BazaarResult<usize> {
        self.clear(customer);
        let mut cached = 0;
        for line in lines {
            if self.cache_on_add(customer, &line.product_id, line.quantity)? {
                cached += 1;
            }
        }
        tracing::debug!(customer_id = %customer, lines = lines.len(), cached, "Synced cart cache");
        Ok(cached)
    }

    /// The customer's cart as product summaries carrying line quantities.
    ///
    /// Served from cache when any line is cached. Otherwise the cart store
    /// is read, products that left the catalog become an "unavailable"
    /// placeholder, and the cache is rebuilt from the store's lines.
    pub fn cart_products<CS>(
        &self,
        customer: &CustomerId,
        cart_store: &CS,
    ) -> BazaarResult<Vec<ProductSummary>>
    where
        CS: CartStore + ?Sized,
    {
        let cached = self.get_all(customer);
        if !cached.is_empty() {
            return Ok(cached
                .into_iter()
                .map(|item| item.product.with_quantity(item.quantity))
                .collect());
        }

        let lines = cart_store.lines(customer)?;
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::with_capacity(lines.len());
        for line in &lines {
            let summary = self
                .products
                .get(&line.product_id)?
                .unwrap_or_else(|| ProductSummary::unavailable(line.product_id.clone()));
            summaries.push(summary.with_quantity(line.quantity));
        }

        self.sync_from_store(customer, &lines)?;
        Ok(summaries)
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// =============================================================================
// TESTS
// =============================================================================
