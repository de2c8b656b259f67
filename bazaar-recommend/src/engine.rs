//! Recommendation engine over the interaction graph and the catalog.

use std::collections::HashMap;
use std::sync::Arc;

use bazaar_core::{
    BazaarResult, ProductId, ProductRecord, ProductSummary, RecommendationConfig, UserId,
};
use bazaar_storage::CatalogStore;
use chrono::Utc;

use crate::graph::InteractionGraph;
use crate::scoring::{price_score, similarity_score, CandidateScores, Tier};

/// Hybrid recommender.
///
/// Every graph or catalog failure aborts the request; an empty graph or
/// catalog yields an empty list.
pub struct RecommendationEngine<G: ?Sized, C: ?Sized> {
    graph: Arc<G>,
    catalog: Arc<C>,
    config: RecommendationConfig,
}

impl<G, C> RecommendationEngine<G, C>
where
    G: InteractionGraph + ?Sized,
    C: CatalogStore + ?Sized,
{
    pub fn new(graph: Arc<G>, catalog: Arc<C>, config: RecommendationConfig) -> Self {
        Self {
            graph,
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    pub fn graph(&self) -> &Arc<G> {
        &self.graph
    }

    /// Idempotent: a repeat view only refreshes the edge timestamp.
    pub fn record_view(&self, user: &UserId, product: &ProductId) -> BazaarResult<()> {
        self.graph.upsert_view(user, product, Utc::now())
    }

    /// Accumulates quantity on the (user, product) purchase edge.
    /// Callers validate that `quantity` is positive.
    pub fn record_purchase(
        &self,
        user: &UserId,
        product: &ProductId,
        quantity: u32,
    ) -> BazaarResult<()> {
        self.graph.upsert_purchase(user, product, quantity, Utc::now())
    }

    /// Up to `result_limit` products for `user`, best first.
    ///
    /// `interaction_count` on each summary carries its ranking score.
    pub fn recommendations_for_user(&self, user: &UserId) -> BazaarResult<Vec<ProductSummary>> {
        let limit = self.config.result_limit;
        let mut scores = CandidateScores::new();

        self.offer_similar_to_last_viewed(user, &mut scores)?;
        tracing::debug!(
            user_id = %user,
            candidates = scores.len(),
            "Similar-to-viewed tier done"
        );

        if scores.len() < limit {
            let collaborative = self
                .graph
                .co_interacted_products(user, self.config.collaborative_limit)?;
            let fresh: Vec<ProductId> = collaborative
                .into_iter()
                .filter(|id| !scores.contains(id))
                .collect();
            let counts = self.graph.interaction_counts(&fresh)?;
            for id in fresh {
                let count = counts.get(&id).copied().unwrap_or(0);
                scores.offer(id, Tier::Collaborative.score(count, &self.config));
            }
            tracing::debug!(user_id = %user, candidates = scores.len(), "Collaborative tier done");
        }

        if scores.len() < limit {
            for (id, count) in self.graph.trending(self.config.trending_limit)? {
                scores.offer(id, Tier::Trending.score(count, &self.config));
            }
            tracing::debug!(user_id = %user, candidates = scores.len(), "Trending tier done");
        }

        if scores.is_empty() {
            return Ok(Vec::new());
        }

        let ranked = scores.ranked();
        self.enrich(user, ranked)
    }

    /// Up to `result_limit` products in the same category as `product`,
    /// ranked by price proximity and (capped) popularity.
    ///
    /// `interaction_count` on each summary carries its similarity score.
    pub fn similar_products(
        &self,
        product: &ProductId,
        user: &UserId,
    ) -> BazaarResult<Vec<ProductSummary>> {
        let Some(reference) = self.catalog.find_by_id(product)? else {
            return Ok(Vec::new());
        };

        let candidates = self
            .catalog
            .find_by_category_excluding(&reference.category, &reference.id)?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<ProductId> = candidates.iter().map(|p| p.id.clone()).collect();
        let counts = self.graph.interaction_counts(&ids)?;

        let mut scored: Vec<(ProductRecord, i64)> = candidates
            .into_iter()
            .map(|candidate| {
                let interactions = counts.get(&candidate.id).copied().unwrap_or(0);
                let score = similarity_score(
                    price_score(reference.price, candidate.price, &self.config.price_bands),
                    interactions,
                    self.config.similar_interaction_cap,
                );
                (candidate, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(self.config.result_limit);

        let kept: Vec<ProductId> = scored.iter().map(|(p, _)| p.id.clone()).collect();
        let viewed = self.graph.viewed_products(user)?;
        let purchases = self.graph.purchase_counts(&kept)?;

        Ok(scored
            .into_iter()
            .map(|(record, score)| {
                let purchase_count = purchases.get(&record.id).copied().unwrap_or(0);
                let seen = viewed.contains(&record.id);
                ProductSummary::from_record(&record)
                    .with_purchase_stats(purchase_count, seen)
                    .with_interaction_count(score)
            })
            .collect())
    }

    fn offer_similar_to_last_viewed(
        &self,
        user: &UserId,
        scores: &mut CandidateScores,
    ) -> BazaarResult<()> {
        let Some(last_viewed) = self.graph.most_recent_view(user)? else {
            return Ok(());
        };
        let Some(reference) = self.catalog.find_by_id(&last_viewed)? else {
            tracing::debug!(
                user_id = %user,
                product_id = %last_viewed,
                "Last viewed product left the catalog"
            );
            return Ok(());
        };

        let ids: Vec<ProductId> = self
            .catalog
            .find_by_category_excluding(&reference.category, &reference.id)?
            .into_iter()
            .map(|p| p.id)
            .collect();
        let counts = self.graph.interaction_counts(&ids)?;
        for id in ids {
            let count = counts.get(&id).copied().unwrap_or(0);
            scores.offer(id, Tier::SimilarToLastViewed.score(count, &self.config));
        }
        Ok(())
    }

    /// Attach catalog attributes and per-user stats to ranked candidates.
    /// Candidates missing from the catalog are dropped before truncation.
    fn enrich(
        &self,
        user: &UserId,
        ranked: Vec<(ProductId, i64)>,
    ) -> BazaarResult<Vec<ProductSummary>> {
        let ids: Vec<ProductId> = ranked.iter().map(|(id, _)| id.clone()).collect();
        let records: HashMap<ProductId, ProductRecord> = self
            .catalog
            .find_all_by_id(&ids)?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        let kept: Vec<(ProductId, i64)> = ranked
            .into_iter()
            .filter(|(id, _)| records.contains_key(id))
            .take(self.config.result_limit)
            .collect();
        if kept.len() < ids.len().min(self.config.result_limit) {
            tracing::debug!(user_id = %user, "Dropped candidates missing from the catalog");
        }

        let kept_ids: Vec<ProductId> = kept.iter().map(|(id, _)| id.clone()).collect();
        let viewed = self.graph.viewed_products(user)?;
        let purchases = self.graph.purchase_counts(&kept_ids)?;

        Ok(kept
            .into_iter()
            .filter_map(|(id, score)| {
                let record = records.get(&id)?;
                let purchase_count = purchases.get(&id).copied().unwrap_or(0);
                Some(
                    ProductSummary::from_record(record)
                        .with_purchase_stats(purchase_count, viewed.contains(&id))
                        .with_interaction_count(score),
                )
            })
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryInteractionGraph;
    use bazaar_storage::InMemoryCatalog;
    use chrono::Duration;

    type Engine = RecommendationEngine<InMemoryInteractionGraph, InMemoryCatalog>;

    fn record(id: &str, category: &str, price: f64) -> ProductRecord {
        ProductRecord {
            id: ProductId::new(id),
            name: id.to_string(),
            description: None,
            price,
            stock: 10,
            image_url: None,
            category: category.to_string(),
            shop_id: None,
            shop_name: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn engine(
        records: Vec<ProductRecord>,
    ) -> (Engine, Arc<InMemoryInteractionGraph>, Arc<InMemoryCatalog>) {
        let graph = Arc::new(InMemoryInteractionGraph::new());
        let catalog = Arc::new(InMemoryCatalog::with_products(records));
        let engine = RecommendationEngine::new(
            graph.clone(),
            catalog.clone(),
            RecommendationConfig::default(),
        );
        (engine, graph, catalog)
    }

    fn ids(items: &[ProductSummary]) -> Vec<&str> {
        items.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_no_history_and_empty_graph_is_empty() {
        let (engine, _, _) = engine(vec![record("a", "x", 1.0)]);
        assert!(engine
            .recommendations_for_user(&UserId::new("u"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_similar_to_viewed_outranks_other_tiers() {
        let (engine, graph, _) = engine(vec![
            record("seen", "lamps", 10.0),
            record("lamp-2", "lamps", 10.0),
            record("mug", "kitchen", 5.0),
            record("pan", "kitchen", 5.0),
        ]);
        let me = UserId::new("me");
        let other = UserId::new("other");
        let now = Utc::now();

        graph.upsert_view(&me, &ProductId::new("seen"), now).unwrap();
        graph.upsert_view(&other, &ProductId::new("seen"), now).unwrap();
        // "mug" is collaborative and heavily trending.
        for i in 0..20 {
            let buyer = UserId::new(format!("buyer-{}", i));
            graph
                .upsert_purchase(&buyer, &ProductId::new("mug"), 1, now)
                .unwrap();
        }
        graph.upsert_view(&other, &ProductId::new("mug"), now).unwrap();
        graph
            .upsert_view(&UserId::new("solo"), &ProductId::new("pan"), now)
            .unwrap();

        let recs = engine.recommendations_for_user(&me).unwrap();
        assert_eq!(ids(&recs)[0], "lamp-2");
        assert!(recs[0].interaction_count >= 1_000_000);

        let mug = recs.iter().find(|p| p.id.as_str() == "mug").unwrap();
        assert_eq!(mug.interaction_count, 500_000 + 21);
        assert_eq!(mug.purchase_count, 20);

        // Trending-only candidates rank by raw count below both.
        let pan = recs.iter().find(|p| p.id.as_str() == "pan").unwrap();
        assert_eq!(pan.interaction_count, 1);
        assert_eq!(ids(&recs).last(), Some(&"pan"));

        // The user's own view counts in trending.
        let seen = recs.iter().find(|p| p.id.as_str() == "seen").unwrap();
        assert!(seen.viewed);
    }

    #[test]
    fn test_missing_last_viewed_product_skips_first_tier() {
        let (engine, graph, catalog) = engine(vec![
            record("gone", "lamps", 10.0),
            record("lamp-2", "lamps", 10.0),
        ]);
        let me = UserId::new("me");
        graph.upsert_view(&me, &ProductId::new("gone"), Utc::now()).unwrap();
        catalog.remove(&ProductId::new("gone")).unwrap();

        let recs = engine.recommendations_for_user(&me).unwrap();
        // Only trending remains, and "gone" is dropped for missing from the catalog.
        assert!(recs.iter().all(|p| p.interaction_count < 500_000));
        assert!(!ids(&recs).contains(&"gone"));
    }

    #[test]
    fn test_most_recent_view_drives_first_tier() {
        let (engine, graph, _) = engine(vec![
            record("lamp", "lamps", 10.0),
            record("lamp-2", "lamps", 10.0),
            record("mug", "kitchen", 5.0),
            record("mug-2", "kitchen", 5.0),
        ]);
        let me = UserId::new("me");
        let t0 = Utc::now();
        graph.upsert_view(&me, &ProductId::new("lamp"), t0).unwrap();
        graph
            .upsert_view(&me, &ProductId::new("mug"), t0 + Duration::seconds(10))
            .unwrap();

        let recs = engine.recommendations_for_user(&me).unwrap();
        assert_eq!(ids(&recs)[0], "mug-2");
        assert!(recs[0].interaction_count >= 1_000_000);
        assert!(recs
            .iter()
            .filter(|p| p.interaction_count >= 1_000_000)
            .all(|p| p.category == "kitchen"));
    }

    #[test]
    fn test_results_capped_and_unique() {
        let mut records = vec![record("seen", "big", 1.0)];
        records.extend((0..60).map(|i| record(&format!("big-{:02}", i), "big", 1.0)));
        records.extend((0..30).map(|i| record(&format!("t-{:02}", i), "misc", 1.0)));
        let (engine, graph, _) = engine(records);
        let me = UserId::new("me");
        let now = Utc::now();
        graph.upsert_view(&me, &ProductId::new("seen"), now).unwrap();
        for i in 0..30 {
            graph
                .upsert_view(&UserId::new("crowd"), &ProductId::new(format!("t-{:02}", i)), now)
                .unwrap();
        }

        let recs = engine.recommendations_for_user(&me).unwrap();
        assert_eq!(recs.len(), 40);
        let unique: std::collections::HashSet<_> = recs.iter().map(|p| &p.id).collect();
        assert_eq!(unique.len(), 40);
        // 60 tier-A candidates fill the list; later tiers never ran.
        assert!(recs.iter().all(|p| p.id.as_str().starts_with("big-")));
    }

    #[test]
    fn test_similar_products_scenario() {
        let (engine, _, _) = engine(vec![record("A", "X", 100.0), record("B", "X", 120.0)]);
        let similar = engine
            .similar_products(&ProductId::new("A"), &UserId::new("u"))
            .unwrap();
        assert_eq!(ids(&similar), vec!["B"]);
        assert_eq!(similar[0].interaction_count, 6);
    }

    #[test]
    fn test_similar_products_ranking_and_enrichment() {
        let (engine, graph, _) = engine(vec![
            record("ref", "X", 100.0),
            record("close", "X", 110.0),
            record("far", "X", 300.0),
            record("popular-far", "X", 300.0),
            record("other", "Y", 100.0),
        ]);
        let u = UserId::new("u");
        let now = Utc::now();
        for i in 0..15 {
            graph
                .upsert_view(&UserId::new(format!("v{}", i)), &ProductId::new("popular-far"), now)
                .unwrap();
        }
        graph.upsert_view(&u, &ProductId::new("close"), now).unwrap();
        graph.upsert_purchase(&u, &ProductId::new("close"), 2, now).unwrap();

        let similar = engine.similar_products(&ProductId::new("ref"), &u).unwrap();
        // popular-far: 1*2 + min(15,10) = 12; close: 3*2 + 2 = 8; far: 2
        assert_eq!(ids(&similar), vec!["popular-far", "close", "far"]);
        assert_eq!(similar[0].interaction_count, 12);
        let close = &similar[1];
        assert!(close.viewed);
        assert_eq!(close.purchase_count, 2);
    }

    #[test]
    fn test_similar_products_unknown_or_alone() {
        let (engine, _, _) = engine(vec![record("solo", "Z", 5.0)]);
        let u = UserId::new("u");
        assert!(engine.similar_products(&ProductId::new("ghost"), &u).unwrap().is_empty());
        assert!(engine.similar_products(&ProductId::new("solo"), &u).unwrap().is_empty());
    }

    #[test]
    fn test_record_view_and_purchase_through_engine() {
        let (engine, graph, _) = engine(vec![]);
        let u = UserId::new("u");
        let p = ProductId::new("p");
        engine.record_view(&u, &p).unwrap();
        engine.record_view(&u, &p).unwrap();
        engine.record_purchase(&u, &p, 3).unwrap();
        engine.record_purchase(&u, &p, 5).unwrap();
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.purchase_counts(&[p.clone()]).unwrap().get(&p), Some(&8));
    }
}
