//! Stock changes: store of record first, then every cached copy.

use std::sync::Arc;

use bazaar_core::{
    BazaarResult, ProductId, ProductRecord, StorageError, ValidationError,
};
use chrono::Utc;

use crate::cache::cart::CartCacheService;
use crate::cache::store::KeyValueStore;
use crate::CatalogStore;

/// Applies stock changes to the catalog and patches the product and cart
/// caches afterwards. There is no cross-key transaction: concurrent commits
/// for one product race and the last writer wins in each store.
pub struct StockSync<S: ?Sized, C: ?Sized> {
    carts: Arc<CartCacheService<S, C>>,
}

impl<S, C> StockSync<S, C>
where
    S: KeyValueStore + ?Sized,
    C: CatalogStore + ?Sized,
{
    pub fn new(carts: Arc<CartCacheService<S, C>>) -> Self {
        Self { carts }
    }

    /// Set the stock level of `product_id` and propagate it.
    pub fn commit_stock(&self, product_id: &ProductId, stock: i32) -> BazaarResult<ProductRecord> {
        let products = self.carts.products();
        let mut record = products
            .catalog()
            .find_by_id(product_id)?
            .ok_or_else(|| StorageError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            })?;

        record.stock = stock;
        record.updated_at = Some(Utc::now());
        products.catalog().save(&record)?;

        products.patch_stock(product_id, stock);
        let carts_patched = self.carts.patch_stock(product_id, stock);
        tracing::info!(product_id = %product_id, stock, carts_patched, "Committed stock");
        Ok(record)
    }

    /// Take `quantity` units out of stock, refusing to go below zero.
    pub fn deduct(&self, product_id: &ProductId, quantity: u32) -> BazaarResult<ProductRecord> {
        let record = self
            .carts
            .products()
            .catalog()
            .find_by_id(product_id)?
            .ok_or_else(|| StorageError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            })?;

        let requested = i64::from(quantity);
        if requested > i64::from(record.stock) {
            return Err(ValidationError::InsufficientStock {
                product_id: product_id.to_string(),
                requested: quantity,
                available: record.stock,
            }
            .into());
        }

        self.commit_stock(product_id, record.stock - quantity as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryKeyValueStore;
    use crate::cache::product::ProductCacheService;
    use crate::InMemoryCatalog;
    use bazaar_core::{BazaarError, CacheConfig, CustomerId};

    fn record(id: &str, stock: i32) -> ProductRecord {
        ProductRecord {
            id: ProductId::new(id),
            name: id.to_string(),
            description: None,
            price: 5.0,
            stock,
            image_url: None,
            category: "misc".to_string(),
            shop_id: None,
            shop_name: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn sync(
        records: Vec<ProductRecord>,
    ) -> (
        StockSync<InMemoryKeyValueStore, InMemoryCatalog>,
        Arc<CartCacheService<InMemoryKeyValueStore, InMemoryCatalog>>,
    ) {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let catalog = Arc::new(InMemoryCatalog::with_products(records));
        let config = CacheConfig::default();
        let products = Arc::new(ProductCacheService::new(store, catalog, &config));
        let carts = Arc::new(CartCacheService::new(products, &config));
        (StockSync::new(carts.clone()), carts)
    }

    #[test]
    fn test_commit_updates_catalog_and_caches() {
        let (sync, carts) = sync(vec![record("a", 10)]);
        let a = ProductId::new("a");
        let c = CustomerId::new("c-1");
        carts.cache_on_add(&c, &a, 1).unwrap();

        let saved = sync.commit_stock(&a, 3).unwrap();
        assert_eq!(saved.stock, 3);
        assert!(saved.updated_at.is_some());

        let products = carts.products();
        assert_eq!(products.catalog().find_by_id(&a).unwrap().unwrap().stock, 3);
        assert_eq!(products.peek(&a).unwrap().stock, 3);
        assert_eq!(carts.get(&c, &a).unwrap().product.stock, 3);
    }

    #[test]
    fn test_deduct_refuses_overdraw() {
        let (sync, _) = sync(vec![record("a", 2)]);
        let err = sync.deduct(&ProductId::new("a"), 3).unwrap_err();
        assert!(matches!(
            err,
            BazaarError::Validation(ValidationError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            })
        ));
        assert_eq!(sync.deduct(&ProductId::new("a"), 2).unwrap().stock, 0);
    }

    #[test]
    fn test_unknown_product_is_not_found() {
        let (sync, _) = sync(vec![]);
        assert!(matches!(
            sync.commit_stock(&ProductId::new("ghost"), 1),
            Err(BazaarError::Storage(StorageError::NotFound { .. }))
        ));
    }
}
