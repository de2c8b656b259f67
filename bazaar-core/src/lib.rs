//! Bazaar Core - Entity Types
//!
//! Plain data structures shared by the storage, cache and recommendation
//! crates. Everything else in the workspace depends on this crate.

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod health;
pub mod identity;

pub use config::{BazaarConfig, CacheConfig, PriceBands, RecommendationConfig};
pub use entities::{CachedCartItem, CartLine, InteractionEdge, ProductRecord, ProductSummary};
pub use enums::{CacheNamespace, InteractionKind};
pub use error::{BazaarError, BazaarResult, CacheError, ConfigError, StorageError, ValidationError};
pub use health::{HealthCheck, HealthStatus};
pub use identity::{
    millis_to_timestamp, timestamp_to_millis, CustomerId, ProductId, Timestamp, UserId,
};
