//! Candidate scoring primitives.

use std::collections::HashMap;

use bazaar_core::{PriceBands, ProductId, RecommendationConfig};

/// Candidate source, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Same category as the user's last viewed product.
    SimilarToLastViewed,
    /// Touched by users who touched the same products.
    Collaborative,
    /// Globally most interacted-with.
    Trending,
}

impl Tier {
    /// Base added to a candidate's interaction count.
    pub fn offset(&self, config: &RecommendationConfig) -> i64 {
        match self {
            Tier::SimilarToLastViewed => config.similar_to_viewed_offset,
            Tier::Collaborative => config.collaborative_offset,
            Tier::Trending => 0,
        }
    }

    pub fn score(&self, interactions: u64, config: &RecommendationConfig) -> i64 {
        self.offset(config)
            .saturating_add(i64::try_from(interactions).unwrap_or(i64::MAX))
    }
}

/// Scores for one recommendation computation.
///
/// The first tier to offer a product owns its score; later offers are
/// ignored. Ranking is stable over offer order.
#[derive(Debug, Clone, Default)]
pub struct CandidateScores {
    order: Vec<ProductId>,
    scores: HashMap<ProductId, i64>,
}

impl CandidateScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the product was new.
    pub fn offer(&mut self, id: ProductId, score: i64) -> bool {
        if self.scores.contains_key(&id) {
            return false;
        }
        self.scores.insert(id.clone(), score);
        self.order.push(id);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &ProductId) -> bool {
        self.scores.contains_key(id)
    }

    pub fn score(&self, id: &ProductId) -> Option<i64> {
        self.scores.get(id).copied()
    }

    /// Highest score first; equal scores keep offer order.
    pub fn ranked(&self) -> Vec<(ProductId, i64)> {
        let mut ranked: Vec<(ProductId, i64)> = self
            .order
            .iter()
            .map(|id| (id.clone(), self.scores.get(id).copied().unwrap_or(0)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

/// 3 for a close price, 2 for a near one, 1 otherwise.
///
/// Closeness is `|candidate - reference| / reference`. A zero reference
/// price only counts a zero-priced candidate as close.
pub fn price_score(reference: f64, candidate: f64, bands: &PriceBands) -> i64 {
    let ratio = if reference == 0.0 {
        if candidate == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        (candidate - reference).abs() / reference.abs()
    };

    if ratio <= bands.close {
        3
    } else if ratio <= bands.near {
        2
    } else {
        1
    }
}

/// `price_score * 2 + min(interactions, cap)`.
pub fn similarity_score(price_score: i64, interactions: u64, cap: u64) -> i64 {
    price_score * 2 + interactions.min(cap) as i64
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_offer_owns_score() {
        let mut scores = CandidateScores::new();
        assert!(scores.offer(ProductId::new("a"), 1_000_003));
        assert!(!scores.offer(ProductId::new("a"), 7));
        assert_eq!(scores.score(&ProductId::new("a")), Some(1_000_003));
        assert_eq!(scores.len(), 1);
    }

    #[test]
    fn test_ranked_is_stable_for_ties() {
        let mut scores = CandidateScores::new();
        scores.offer(ProductId::new("x"), 5);
        scores.offer(ProductId::new("y"), 9);
        scores.offer(ProductId::new("z"), 5);
        let ranked: Vec<String> = scores
            .ranked()
            .into_iter()
            .map(|(id, _)| id.into_inner())
            .collect();
        assert_eq!(ranked, vec!["y", "x", "z"]);
    }

    #[test]
    fn test_price_bands() {
        let bands = PriceBands::default();
        assert_eq!(price_score(100.0, 120.0, &bands), 3);
        assert_eq!(price_score(100.0, 130.0, &bands), 3);
        assert_eq!(price_score(100.0, 145.0, &bands), 2);
        assert_eq!(price_score(100.0, 50.0, &bands), 2);
        assert_eq!(price_score(100.0, 151.0, &bands), 1);
        assert_eq!(price_score(100.0, 10.0, &bands), 1);
    }

    #[test]
    fn test_zero_reference_price() {
        let bands = PriceBands::default();
        assert_eq!(price_score(0.0, 0.0, &bands), 3);
        assert_eq!(price_score(0.0, 1.0, &bands), 1);
    }

    #[test]
    fn test_similarity_score_caps_interactions() {
        assert_eq!(similarity_score(3, 0, 10), 6);
        assert_eq!(similarity_score(2, 4, 10), 8);
        assert_eq!(similarity_score(1, 250, 10), 12);
    }

    #[test]
    fn test_tier_offsets_order_tiers() {
        let config = RecommendationConfig::default();
        assert_eq!(Tier::SimilarToLastViewed.score(0, &config), 1_000_000);
        assert_eq!(Tier::Collaborative.score(7, &config), 500_007);
        assert_eq!(Tier::Trending.score(7, &config), 7);
    }
}
