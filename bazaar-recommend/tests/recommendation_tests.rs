use std::sync::Arc;

use bazaar_core::{ProductId, RecommendationConfig, UserId};
use bazaar_recommend::{InMemoryInteractionGraph, InteractionGraph, RecommendationEngine};
use bazaar_storage::InMemoryCatalog;
use bazaar_test_utils::assertions::{assert_ranked, assert_storage_error, assert_unique_ids, ids};
use bazaar_test_utils::fixtures::{category_products, product, ProductBuilder};
use bazaar_test_utils::{CacheConfig, FailingCatalog, FailingGraph, Harness};
use chrono::{Duration, Utc};

fn storefront() -> Harness {
    Harness::with_products(vec![
        product("desk-lamp", "lamps", 40.0),
        product("floor-lamp", "lamps", 90.0),
        product("lantern", "lamps", 25.0),
        product("mug", "kitchen", 8.0),
        product("kettle", "kitchen", 30.0),
        product("spade", "garden", 15.0),
    ])
}

#[test]
fn tiers_rank_similar_then_collaborative_then_trending() {
    let h = storefront();
    h.view("alice", "desk-lamp");
    h.view("bob", "desk-lamp");
    h.buy("bob", "kettle", 1);
    for buyer in ["c1", "c2", "c3", "c4"] {
        h.buy(buyer, "spade", 2);
    }

    let recs = h
        .engine
        .recommendations_for_user(&UserId::new("alice"))
        .expect("recommendations");

    assert_eq!(ids(&recs), vec!["floor-lamp", "lantern", "kettle", "spade", "desk-lamp"]);
    assert_eq!(recs[0].interaction_count, 1_000_000);
    assert_eq!(recs[2].interaction_count, 500_001);
    assert_eq!(recs[3].interaction_count, 4);
    assert_eq!(recs[3].purchase_count, 8);
    assert!(recs[4].viewed);
    assert!(!recs[0].viewed);
    assert_ranked(&recs);
    assert_unique_ids(&recs);
}

#[test]
fn first_tier_keeps_its_score_when_product_is_also_trending() {
    let h = storefront();
    h.view("alice", "desk-lamp");
    for viewer in ["v1", "v2", "v3"] {
        h.view(viewer, "lantern");
    }

    let recs = h
        .engine
        .recommendations_for_user(&UserId::new("alice"))
        .expect("recommendations");
    let lantern = recs.iter().find(|p| p.id.as_str() == "lantern").expect("lantern");
    assert_eq!(lantern.interaction_count, 1_000_003);
    assert_eq!(ids(&recs)[0], "lantern");
}

#[test]
fn latest_view_selects_category() {
    let h = storefront();
    let t0 = Utc::now();
    h.view_at("alice", "desk-lamp", t0);
    h.view_at("alice", "mug", t0 + Duration::minutes(1));

    let recs = h
        .engine
        .recommendations_for_user(&UserId::new("alice"))
        .expect("recommendations");
    assert_eq!(ids(&recs)[0], "kettle");
    assert!(recs
        .iter()
        .filter(|p| p.interaction_count >= 1_000_000)
        .all(|p| p.category == "kitchen"));
}

#[test]
fn new_user_on_empty_graph_gets_nothing() {
    let h = storefront();
    let recs = h
        .engine
        .recommendations_for_user(&UserId::new("newcomer"))
        .expect("recommendations");
    assert!(recs.is_empty());
}

#[test]
fn new_user_gets_trending_products() {
    let h = storefront();
    h.view("a", "mug");
    h.view("b", "mug");
    h.view("a", "spade");

    let recs = h
        .engine
        .recommendations_for_user(&UserId::new("newcomer"))
        .expect("recommendations");
    assert_eq!(ids(&recs), vec!["mug", "spade"]);
    assert_eq!(recs[0].interaction_count, 2);
}

#[test]
fn results_never_exceed_limit() {
    let h = Harness::with_products(category_products("lamp", "lamps", 70));
    h.view("alice", "lamp-00");
    let recs = h
        .engine
        .recommendations_for_user(&UserId::new("alice"))
        .expect("recommendations");
    assert_eq!(recs.len(), 40);
    assert_unique_ids(&recs);
}

#[test]
fn configured_limit_caps_results() {
    let h = Harness::with_config(
        CacheConfig::default(),
        RecommendationConfig::default().with_result_limit(3),
    );
    for p in category_products("lamp", "lamps", 10) {
        h.add_product(&p);
    }
    h.view("alice", "lamp-00");
    let recs = h
        .engine
        .recommendations_for_user(&UserId::new("alice"))
        .expect("recommendations");
    assert_eq!(ids(&recs), vec!["lamp-01", "lamp-02", "lamp-03"]);
}

#[test]
fn products_dropped_from_catalog_are_skipped() {
    let h = storefront();
    h.view("a", "mug");
    h.view("a", "spade");
    h.catalog.remove(&ProductId::new("mug")).expect("remove");

    let recs = h
        .engine
        .recommendations_for_user(&UserId::new("newcomer"))
        .expect("recommendations");
    assert_eq!(ids(&recs), vec!["spade"]);
}

#[test]
fn repeat_views_are_idempotent() {
    let h = storefront();
    h.view("alice", "mug");
    h.view("alice", "mug");
    let edges = h
        .graph
        .edges(&UserId::new("alice"), &ProductId::new("mug"))
        .expect("edges");
    assert_eq!(edges.len(), 1);
    assert_eq!(h.graph.interaction_count(&ProductId::new("mug")).expect("count"), 1);
}

#[test]
fn purchases_accumulate() {
    let h = storefront();
    h.buy("alice", "mug", 3);
    h.buy("alice", "mug", 5);
    let edges = h
        .graph
        .edges(&UserId::new("alice"), &ProductId::new("mug"))
        .expect("edges");
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].quantity, Some(8));
}

#[test]
fn similar_products_prefers_close_prices() {
    let h = Harness::with_products(vec![
        product("A", "X", 100.0),
        product("B", "X", 120.0),
    ]);
    let similar = h
        .engine
        .similar_products(&ProductId::new("A"), &UserId::new("alice"))
        .expect("similar");
    assert_eq!(ids(&similar), vec!["B"]);
    assert_eq!(similar[0].interaction_count, 6);
}

#[test]
fn similar_products_mixes_price_and_popularity() {
    let h = Harness::with_products(vec![
        product("ref", "lamps", 100.0),
        product("twin", "lamps", 100.0),
        product("pricier", "lamps", 140.0),
        product("bargain", "lamps", 20.0),
        ProductBuilder::new("elsewhere").category("garden").price(100.0).build(),
    ]);
    for viewer in ["a", "b", "c", "d", "e"] {
        h.view(viewer, "bargain");
    }
    h.view("alice", "pricier");

    let similar = h
        .engine
        .similar_products(&ProductId::new("ref"), &UserId::new("alice"))
        .expect("similar");
    // bargain 1*2+5, twin 3*2+0, pricier 2*2+1
    assert_eq!(ids(&similar), vec!["bargain", "twin", "pricier"]);
    assert_eq!(
        similar.iter().map(|p| p.interaction_count).collect::<Vec<_>>(),
        vec![7, 6, 5]
    );
    assert!(similar[2].viewed);
}

#[test]
fn similar_products_for_unknown_product_is_empty() {
    let h = storefront();
    let similar = h
        .engine
        .similar_products(&ProductId::new("ghost"), &UserId::new("alice"))
        .expect("similar");
    assert!(similar.is_empty());
}

#[test]
fn graph_failure_propagates() {
    let catalog = Arc::new(InMemoryCatalog::with_products(vec![
        product("A", "X", 1.0),
        product("B", "X", 1.0),
    ]));
    let engine = RecommendationEngine::new(
        Arc::new(FailingGraph),
        catalog,
        RecommendationConfig::default(),
    );
    let user = UserId::new("alice");

    assert_storage_error(&engine.recommendations_for_user(&user));
    assert_storage_error(&engine.similar_products(&ProductId::new("A"), &user));
    assert_storage_error(&engine.record_view(&user, &ProductId::new("A")));
}

#[test]
fn catalog_failure_propagates() {
    let graph = Arc::new(InMemoryInteractionGraph::new());
    graph
        .upsert_view(&UserId::new("alice"), &ProductId::new("A"), Utc::now())
        .expect("seed view");
    let engine = RecommendationEngine::new(
        graph,
        Arc::new(FailingCatalog),
        RecommendationConfig::default(),
    );

    assert_storage_error(&engine.recommendations_for_user(&UserId::new("alice")));
    assert_storage_error(&engine.similar_products(&ProductId::new("A"), &UserId::new("alice")));
}
