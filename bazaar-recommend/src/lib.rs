//! Bazaar Recommend - Hybrid Recommendation Engine
//!
//! Ranks products for a user by merging three candidate tiers drawn from
//! the interaction graph and the catalog:
//!
//! 1. products in the category of the user's last viewed product,
//! 2. products touched by users who touched the same products (collaborative),
//! 3. globally trending products.
//!
//! Each tier only runs while the candidate set is below the result limit,
//! and the tier offsets keep every earlier-tier candidate above every
//! later-tier one.

pub mod engine;
pub mod graph;
pub mod scoring;

pub use engine::RecommendationEngine;
pub use graph::{InMemoryInteractionGraph, InteractionGraph};
pub use scoring::{price_score, similarity_score, CandidateScores, Tier};
