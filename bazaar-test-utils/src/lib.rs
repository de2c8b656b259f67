//! Bazaar Test Utilities
//!
//! Shared test infrastructure for the Bazaar workspace:
//! - Fixtures and a product builder
//! - Proptest generators for catalog and cache types
//! - Failing stores for error-path tests
//! - A pre-wired in-memory [`Harness`]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub use bazaar_core::{
    BazaarError, BazaarResult, CacheConfig, CachedCartItem, CartLine, CustomerId, InteractionEdge,
    ProductId, ProductRecord, ProductSummary, RecommendationConfig, StorageError, Timestamp,
    UserId,
};
use bazaar_recommend::{InMemoryInteractionGraph, InteractionGraph, RecommendationEngine};
use bazaar_storage::{
    CacheMonitor, CartCacheService, CatalogStore, InMemoryCartStore, InMemoryCatalog,
    InMemoryKeyValueStore, OrderCooldown, ProductCacheService, StockSync,
};
use chrono::Utc;

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made records for common scenarios.

    use super::*;

    /// Builder for [`ProductRecord`] with sensible defaults.
    #[derive(Debug, Clone)]
    pub struct ProductBuilder {
        record: ProductRecord,
    }

    impl ProductBuilder {
        pub fn new(id: impl Into<ProductId>) -> Self {
            let id = id.into();
            Self {
                record: ProductRecord {
                    name: format!("Product {}", id),
                    id,
                    description: None,
                    price: 10.0,
                    stock: 10,
                    image_url: None,
                    category: "general".to_string(),
                    shop_id: None,
                    shop_name: None,
                    created_at: None,
                    updated_at: None,
                },
            }
        }

        pub fn name(mut self, name: impl Into<String>) -> Self {
            self.record.name = name.into();
            self
        }

        pub fn price(mut self, price: f64) -> Self {
            self.record.price = price;
            self
        }

        pub fn stock(mut self, stock: i32) -> Self {
            self.record.stock = stock;
            self
        }

        pub fn category(mut self, category: impl Into<String>) -> Self {
            self.record.category = category.into();
            self
        }

        pub fn shop(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
            self.record.shop_id = Some(id.into());
            self.record.shop_name = Some(name.into());
            self
        }

        pub fn stamped(mut self) -> Self {
            let now = Utc::now();
            self.record.created_at = Some(now);
            self.record.updated_at = Some(now);
            self
        }

        pub fn build(self) -> ProductRecord {
            self.record
        }
    }

    pub fn product(id: &str, category: &str, price: f64) -> ProductRecord {
        ProductBuilder::new(id).category(category).price(price).build()
    }

    /// `count` products named `{prefix}-00`, `{prefix}-01`, ... in one category.
    pub fn category_products(prefix: &str, category: &str, count: usize) -> Vec<ProductRecord> {
        (0..count)
            .map(|i| product(&format!("{}-{:02}", prefix, i), category, 10.0))
            .collect()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Bazaar entity types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_product_id() -> impl Strategy<Value = ProductId> {
        "[a-f0-9]{8}".prop_map(ProductId::new)
    }

    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        "u-[a-z0-9]{6}".prop_map(UserId::new)
    }

    pub fn arb_category() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("lamps".to_string()),
            Just("kitchen".to_string()),
            Just("garden".to_string()),
            Just("books".to_string()),
        ]
    }

    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (0i64..4_000_000_000_000).prop_map(bazaar_core::millis_to_timestamp)
    }

    pub fn arb_product_record() -> impl Strategy<Value = ProductRecord> {
        (
            arb_product_id(),
            "[A-Za-z ]{1,24}",
            proptest::option::of("[a-z ]{0,40}"),
            0.0f64..10_000.0,
            -5i32..500,
            arb_category(),
            proptest::option::of(arb_timestamp()),
        )
            .prop_map(|(id, name, description, price, stock, category, created_at)| {
                ProductRecord {
                    id,
                    name,
                    description,
                    price,
                    stock,
                    image_url: None,
                    category,
                    shop_id: None,
                    shop_name: None,
                    created_at,
                    updated_at: created_at,
                }
            })
    }

    pub fn arb_product_summary() -> impl Strategy<Value = ProductSummary> {
        (arb_product_record(), 0u64..1_000, any::<bool>(), 0i64..2_000_000, 0u32..20).prop_map(
            |(record, purchases, viewed, interactions, quantity)| {
                ProductSummary::from_record(&record)
                    .with_purchase_stats(purchases, viewed)
                    .with_interaction_count(interactions)
                    .with_quantity(quantity)
            },
        )
    }

    pub fn arb_cached_cart_item() -> impl Strategy<Value = CachedCartItem> {
        (arb_product_summary(), 1u32..50, 0i64..4_000_000_000_000)
            .prop_map(|(product, quantity, ts)| CachedCartItem::new(product, quantity, ts))
    }

    /// A catalog of distinct products plus a list of (user, product index, bought) events.
    pub fn arb_activity(
        max_products: usize,
        max_events: usize,
    ) -> impl Strategy<Value = (Vec<ProductRecord>, Vec<(UserId, usize, bool)>)> {
        proptest::collection::vec(arb_product_record(), 1..=max_products)
            .prop_map(|records| {
                let mut seen = HashSet::new();
                records
                    .into_iter()
                    .filter(|r| seen.insert(r.id.clone()))
                    .collect::<Vec<_>>()
            })
            .prop_flat_map(move |records| {
                let len = records.len();
                let events = proptest::collection::vec(
                    (
                        prop_oneof![Just("u-1"), Just("u-2"), Just("u-3"), Just("u-4")]
                            .prop_map(UserId::new),
                        0..len,
                        any::<bool>(),
                    ),
                    0..=max_events,
                );
                (Just(records), events)
            })
    }
}

// ============================================================================
// FAILING STORES
// ============================================================================

fn unavailable<T>(store: &'static str) -> BazaarResult<T> {
    Err(StorageError::Unavailable {
        store,
        reason: "simulated outage".to_string(),
    }
    .into())
}

/// Catalog whose every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingCatalog;

impl CatalogStore for FailingCatalog {
    fn find_by_id(&self, _id: &ProductId) -> BazaarResult<Option<ProductRecord>> {
        unavailable("catalog")
    }

    fn find_all_by_id(&self, _ids: &[ProductId]) -> BazaarResult<Vec<ProductRecord>> {
        unavailable("catalog")
    }

    fn find_by_category_excluding(
        &self,
        _category: &str,
        _excluded: &ProductId,
    ) -> BazaarResult<Vec<ProductRecord>> {
        unavailable("catalog")
    }

    fn save(&self, _product: &ProductRecord) -> BazaarResult<()> {
        unavailable("catalog")
    }
}

/// Interaction graph whose every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingGraph;

impl InteractionGraph for FailingGraph {
    fn upsert_view(
        &self,
        _user: &UserId,
        _product: &ProductId,
        _at: Timestamp,
    ) -> BazaarResult<()> {
        unavailable("graph")
    }

    fn upsert_purchase(
        &self,
        _user: &UserId,
        _product: &ProductId,
        _quantity: u32,
        _at: Timestamp,
    ) -> BazaarResult<()> {
        unavailable("graph")
    }

    fn most_recent_view(&self, _user: &UserId) -> BazaarResult<Option<ProductId>> {
        unavailable("graph")
    }

    fn interaction_count(&self, _product: &ProductId) -> BazaarResult<u64> {
        unavailable("graph")
    }

    fn co_interacted_products(
        &self,
        _user: &UserId,
        _limit: usize,
    ) -> BazaarResult<Vec<ProductId>> {
        unavailable("graph")
    }

    fn trending(&self, _limit: usize) -> BazaarResult<Vec<(ProductId, u64)>> {
        unavailable("graph")
    }

    fn viewed_products(&self, _user: &UserId) -> BazaarResult<HashSet<ProductId>> {
        unavailable("graph")
    }

    fn purchase_counts(&self, _products: &[ProductId]) -> BazaarResult<HashMap<ProductId, u64>> {
        unavailable("graph")
    }

    fn edges(&self, _user: &UserId, _product: &ProductId) -> BazaarResult<Vec<InteractionEdge>> {
        unavailable("graph")
    }
}

// ============================================================================
// HARNESS
// ============================================================================

/// Every service wired over in-memory stores.
pub struct Harness {
    pub store: Arc<InMemoryKeyValueStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub carts: Arc<InMemoryCartStore>,
    pub graph: Arc<InMemoryInteractionGraph>,
    pub products: Arc<ProductCacheService<InMemoryKeyValueStore, InMemoryCatalog>>,
    pub cart_cache: Arc<CartCacheService<InMemoryKeyValueStore, InMemoryCatalog>>,
    pub stock: StockSync<InMemoryKeyValueStore, InMemoryCatalog>,
    pub cooldown: OrderCooldown<InMemoryKeyValueStore>,
    pub monitor: CacheMonitor<InMemoryKeyValueStore>,
    pub engine: RecommendationEngine<InMemoryInteractionGraph, InMemoryCatalog>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default(), RecommendationConfig::default())
    }

    pub fn with_products(products: impl IntoIterator<Item = ProductRecord>) -> Self {
        let harness = Self::new();
        for product in products {
            harness.add_product(&product);
        }
        harness
    }

    pub fn with_config(cache: CacheConfig, recommendation: RecommendationConfig) -> Self {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let carts = Arc::new(InMemoryCartStore::new());
        let graph = Arc::new(InMemoryInteractionGraph::new());

        let products = Arc::new(ProductCacheService::new(store.clone(), catalog.clone(), &cache));
        let cart_cache = Arc::new(CartCacheService::new(products.clone(), &cache));

        Self {
            stock: StockSync::new(cart_cache.clone()),
            cooldown: OrderCooldown::new(store.clone(), &cache),
            monitor: CacheMonitor::new(store.clone()),
            engine: RecommendationEngine::new(graph.clone(), catalog.clone(), recommendation),
            store,
            catalog,
            carts,
            graph,
            products,
            cart_cache,
        }
    }

    /// Insert into the catalog. Panics on a poisoned lock.
    pub fn add_product(&self, product: &ProductRecord) {
        self.catalog
            .save(product)
            .unwrap_or_else(|e| panic!("seed product {}: {}", product.id, e));
    }

    pub fn view(&self, user: &str, product: &str) {
        self.engine
            .record_view(&UserId::new(user), &ProductId::new(product))
            .unwrap_or_else(|e| panic!("record view: {}", e));
    }

    pub fn buy(&self, user: &str, product: &str, quantity: u32) {
        self.engine
            .record_purchase(&UserId::new(user), &ProductId::new(product), quantity)
            .unwrap_or_else(|e| panic!("record purchase: {}", e));
    }

    /// View edge with an explicit timestamp, for ordering-sensitive tests.
    pub fn view_at(&self, user: &str, product: &str, at: Timestamp) {
        self.graph
            .upsert_view(&UserId::new(user), &ProductId::new(product), at)
            .unwrap_or_else(|e| panic!("record view: {}", e));
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Bazaar-specific results.

    use super::*;

    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &BazaarResult<T>) {
        match result {
            Err(BazaarError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &BazaarResult<T>, entity: &str) {
        match result {
            Err(BazaarError::Storage(StorageError::NotFound { entity: e, .. })) => {
                assert_eq!(*e, entity, "Wrong entity in NotFound error");
            }
            other => panic!("Expected NotFound error for {}, got: {:?}", entity, other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &BazaarResult<T>) {
        match result {
            Err(BazaarError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Ids in order, for compact comparisons.
    pub fn ids(products: &[ProductSummary]) -> Vec<&str> {
        products.iter().map(|p| p.id.as_str()).collect()
    }

    #[track_caller]
    pub fn assert_unique_ids(products: &[ProductSummary]) {
        let unique: HashSet<&ProductId> = products.iter().map(|p| &p.id).collect();
        assert_eq!(unique.len(), products.len(), "Duplicate ids in {:?}", ids(products));
    }

    #[track_caller]
    pub fn assert_ranked(products: &[ProductSummary]) {
        assert!(
            products
                .windows(2)
                .all(|w| w[0].interaction_count >= w[1].interaction_count),
            "Not ranked by score: {:?}",
            products.iter().map(|p| p.interaction_count).collect::<Vec<_>>()
        );
    }
}
