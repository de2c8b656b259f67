//! Interaction graph boundary and in-memory implementation.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use bazaar_core::{
    BazaarResult, InteractionEdge, InteractionKind, ProductId, StorageError, Timestamp, UserId,
};

/// Store of `User --VIEWED/BOUGHT--> Product` edges.
///
/// There is at most one edge per (user, product, kind). Edges are created
/// on the first event, updated on repeats and never deleted.
pub trait InteractionGraph: Send + Sync {
    /// Create the view edge or refresh its timestamp.
    fn upsert_view(&self, user: &UserId, product: &ProductId, at: Timestamp) -> BazaarResult<()>;

    /// Create the purchase edge or add `quantity` to it, refreshing its timestamp.
    fn upsert_purchase(
        &self,
        user: &UserId,
        product: &ProductId,
        quantity: u32,
        at: Timestamp,
    ) -> BazaarResult<()>;

    /// Product of the user's latest view edge. Ties resolve arbitrarily.
    fn most_recent_view(&self, user: &UserId) -> BazaarResult<Option<ProductId>>;

    /// Number of incident view and purchase edges.
    fn interaction_count(&self, product: &ProductId) -> BazaarResult<u64>;

    /// [`interaction_count`](Self::interaction_count) for many products at once.
    /// Products without edges may be absent from the map.
    fn interaction_counts(&self, products: &[ProductId]) -> BazaarResult<HashMap<ProductId, u64>> {
        let mut counts = HashMap::with_capacity(products.len());
        for product in products {
            counts.insert(product.clone(), self.interaction_count(product)?);
        }
        Ok(counts)
    }

    /// Products reached by `user -> product -> other user -> other product`,
    /// excluding the product that linked the two users. Distinct, at most `limit`.
    fn co_interacted_products(&self, user: &UserId, limit: usize) -> BazaarResult<Vec<ProductId>>;

    /// Products by descending interaction count, at most `limit`.
    fn trending(&self, limit: usize) -> BazaarResult<Vec<(ProductId, u64)>>;

    fn viewed_products(&self, user: &UserId) -> BazaarResult<HashSet<ProductId>>;

    /// Total purchased quantity per product across all users.
    /// Products never bought may be absent from the map.
    fn purchase_counts(&self, products: &[ProductId]) -> BazaarResult<HashMap<ProductId, u64>>;

    /// Every edge between `user` and `product`.
    fn edges(&self, user: &UserId, product: &ProductId) -> BazaarResult<Vec<InteractionEdge>>;
}

type EdgeKey = (UserId, ProductId, InteractionKind);

/// In-memory graph. Enumeration follows (user, product) order, which keeps
/// traversal results deterministic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInteractionGraph {
    edges: Arc<RwLock<BTreeMap<EdgeKey, InteractionEdge>>>,
}

impl InMemoryInteractionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.read().map(|e| e.len()).unwrap_or(0)
    }
}

impl InteractionGraph for InMemoryInteractionGraph {
    fn upsert_view(&self, user: &UserId, product: &ProductId, at: Timestamp) -> BazaarResult<()> {
        let mut edges = self.edges.write().map_err(|_| StorageError::LockPoisoned)?;
        edges
            .entry((user.clone(), product.clone(), InteractionKind::Viewed))
            .and_modify(|e| e.timestamp = at)
            .or_insert_with(|| InteractionEdge {
                user_id: user.clone(),
                product_id: product.clone(),
                kind: InteractionKind::Viewed,
                timestamp: at,
                quantity: None,
            });
        Ok(())
    }

    fn upsert_purchase(
        &self,
        user: &UserId,
        product: &ProductId,
        quantity: u32,
        at: Timestamp,
    ) -> BazaarResult<()> {
        let mut edges = self.edges.write().map_err(|_| StorageError::LockPoisoned)?;
        edges
            .entry((user.clone(), product.clone(), InteractionKind::Bought))
            .and_modify(|e| {
                e.quantity = Some(e.quantity.unwrap_or(0) + u64::from(quantity));
                e.timestamp = at;
            })
            .or_insert_with(|| InteractionEdge {
                user_id: user.clone(),
                product_id: product.clone(),
                kind: InteractionKind::Bought,
                timestamp: at,
                quantity: Some(u64::from(quantity)),
            });
        Ok(())
    }

    fn most_recent_view(&self, user: &UserId) -> BazaarResult<Option<ProductId>> {
        let edges = self.edges.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(edges
            .values()
            .filter(|e| &e.user_id == user && e.kind == InteractionKind::Viewed)
            .max_by_key(|e| e.timestamp)
            .map(|e| e.product_id.clone()))
    }

    fn interaction_count(&self, product: &ProductId) -> BazaarResult<u64> {
        let edges = self.edges.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(edges.values().filter(|e| &e.product_id == product).count() as u64)
    }

    fn interaction_counts(&self, products: &[ProductId]) -> BazaarResult<HashMap<ProductId, u64>> {
        let wanted: HashSet<&ProductId> = products.iter().collect();
        let edges = self.edges.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut counts = HashMap::new();
        for edge in edges.values().filter(|e| wanted.contains(&e.product_id)) {
            *counts.entry(edge.product_id.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn co_interacted_products(&self, user: &UserId, limit: usize) -> BazaarResult<Vec<ProductId>> {
        let edges = self.edges.read().map_err(|_| StorageError::LockPoisoned)?;

        let mut products_by_user: BTreeMap<&UserId, BTreeSet<&ProductId>> = BTreeMap::new();
        let mut users_by_product: BTreeMap<&ProductId, BTreeSet<&UserId>> = BTreeMap::new();
        for (u, p, _) in edges.keys() {
            products_by_user.entry(u).or_default().insert(p);
            users_by_product.entry(p).or_default().insert(u);
        }

        let Some(own) = products_by_user.get(user) else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for &linking in own {
            let Some(others) = users_by_product.get(linking) else {
                continue;
            };
            for &other in others.iter().filter(|&&u| u != user) {
                let Some(their_products) = products_by_user.get(other) else {
                    continue;
                };
                for &candidate in their_products.iter().filter(|&&p| p != linking) {
                    if result.len() >= limit {
                        return Ok(result);
                    }
                    if seen.insert(candidate) {
                        result.push(candidate.clone());
                    }
                }
            }
        }
        Ok(result)
    }

    fn trending(&self, limit: usize) -> BazaarResult<Vec<(ProductId, u64)>> {
        let edges = self.edges.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut counts: BTreeMap<&ProductId, u64> = BTreeMap::new();
        for edge in edges.values() {
            *counts.entry(&edge.product_id).or_insert(0) += 1;
        }
        let mut ranked: Vec<(ProductId, u64)> =
            counts.into_iter().map(|(p, c)| (p.clone(), c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(limit);
        Ok(ranked)
    }

    fn viewed_products(&self, user: &UserId) -> BazaarResult<HashSet<ProductId>> {
        let edges = self.edges.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(edges
            .values()
            .filter(|e| &e.user_id == user && e.kind == InteractionKind::Viewed)
            .map(|e| e.product_id.clone())
            .collect())
    }

    fn purchase_counts(&self, products: &[ProductId]) -> BazaarResult<HashMap<ProductId, u64>> {
        let wanted: HashSet<&ProductId> = products.iter().collect();
        let edges = self.edges.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut counts = HashMap::new();
        for edge in edges
            .values()
            .filter(|e| e.kind == InteractionKind::Bought && wanted.contains(&e.product_id))
        {
            *counts.entry(edge.product_id.clone()).or_insert(0) += edge.quantity.unwrap_or(0);
        }
        Ok(counts)
    }

    fn edges(&self, user: &UserId, product: &ProductId) -> BazaarResult<Vec<InteractionEdge>> {
        let edges = self.edges.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(edges
            .values()
            .filter(|e| &e.user_id == user && &e.product_id == product)
            .cloned()
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
