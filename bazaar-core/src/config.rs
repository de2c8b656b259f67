//! Configuration types

use crate::{BazaarError, BazaarResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Expiration policy for the cache namespaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Product entries
    pub product_ttl: Duration,
    /// Cart line entries
    pub cart_ttl: Duration,
    /// Window in which a second order request from the same customer is refused
    pub order_cooldown: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            product_ttl: Duration::from_secs(24 * 60 * 60),
            cart_ttl: Duration::from_secs(12 * 60 * 60),
            order_cooldown: Duration::from_secs(5),
        }
    }
}

impl CacheConfig {
    pub fn with_product_ttl(mut self, ttl: Duration) -> Self {
        self.product_ttl = ttl;
        self
    }

    pub fn with_cart_ttl(mut self, ttl: Duration) -> Self {
        self.cart_ttl = ttl;
        self
    }

    pub fn with_order_cooldown(mut self, cooldown: Duration) -> Self {
        self.order_cooldown = cooldown;
        self
    }
}

/// Relative-price thresholds for similar-product scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBands {
    /// Ratio at or below which a candidate earns the top price score (3).
    pub close: f64,
    /// Ratio at or below which a candidate earns the middle price score (2).
    pub near: f64,
}

impl Default for PriceBands {
    fn default() -> Self {
        Self {
            close: 0.3,
            near: 0.5,
        }
    }
}

/// Recommendation ranking parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Maximum items returned, and the candidate count that stops tier expansion.
    pub result_limit: usize,
    pub collaborative_limit: usize,
    pub trending_limit: usize,
    /// Base score for products sharing a category with the last viewed product.
    pub similar_to_viewed_offset: i64,
    /// Base score for collaborative candidates.
    pub collaborative_offset: i64,
    /// Cap on the interaction-count term in similar-product scoring.
    pub similar_interaction_cap: u64,
    pub price_bands: PriceBands,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            result_limit: 40,
            collaborative_limit: 25,
            trending_limit: 40,
            similar_to_viewed_offset: 1_000_000,
            collaborative_offset: 500_000,
            similar_interaction_cap: 10,
            price_bands: PriceBands::default(),
        }
    }
}

impl RecommendationConfig {
    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }

    pub fn with_collaborative_limit(mut self, limit: usize) -> Self {
        self.collaborative_limit = limit;
        self
    }

    pub fn with_trending_limit(mut self, limit: usize) -> Self {
        self.trending_limit = limit;
        self
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BazaarConfig {
    pub cache: CacheConfig,
    pub recommendation: RecommendationConfig,
}

impl BazaarConfig {
    /// Defaults overridden by `BAZAAR_*` environment variables, then validated.
    ///
    /// Recognised variables:
    /// - `BAZAAR_PRODUCT_TTL_SECS`, `BAZAAR_CART_TTL_SECS`, `BAZAAR_ORDER_COOLDOWN_SECS`
    /// - `BAZAAR_RECOMMENDATION_LIMIT`, `BAZAAR_COLLABORATIVE_LIMIT`, `BAZAAR_TRENDING_LIMIT`
    pub fn from_env() -> BazaarResult<Self> {
        let mut config = Self::default();

        if let Some(secs) = env_parse::<u64>("BAZAAR_PRODUCT_TTL_SECS")? {
            config.cache.product_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("BAZAAR_CART_TTL_SECS")? {
            config.cache.cart_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("BAZAAR_ORDER_COOLDOWN_SECS")? {
            config.cache.order_cooldown = Duration::from_secs(secs);
        }
        if let Some(limit) = env_parse::<usize>("BAZAAR_RECOMMENDATION_LIMIT")? {
            config.recommendation.result_limit = limit;
        }
        if let Some(limit) = env_parse::<usize>("BAZAAR_COLLABORATIVE_LIMIT")? {
            config.recommendation.collaborative_limit = limit;
        }
        if let Some(limit) = env_parse::<usize>("BAZAAR_TRENDING_LIMIT")? {
            config.recommendation.trending_limit = limit;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - all TTLs and the order cooldown are positive
    /// - all limits are positive
    /// - tier offsets are strictly ordered and positive
    /// - price bands satisfy `0 < close <= near`
    pub fn validate(&self) -> BazaarResult<()> {
        let durations = [
            ("product_ttl", self.cache.product_ttl),
            ("cart_ttl", self.cache.cart_ttl),
            ("order_cooldown", self.cache.order_cooldown),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(invalid(field, format!("{:?}", value), "must be positive"));
            }
        }

        let rec = &self.recommendation;
        let limits = [
            ("result_limit", rec.result_limit),
            ("collaborative_limit", rec.collaborative_limit),
            ("trending_limit", rec.trending_limit),
        ];
        for (field, value) in limits {
            if value == 0 {
                return Err(invalid(field, value.to_string(), "must be greater than 0"));
            }
        }

        if rec.collaborative_offset <= 0 {
            return Err(invalid(
                "collaborative_offset",
                rec.collaborative_offset.to_string(),
                "must be greater than 0",
            ));
        }
        if rec.similar_to_viewed_offset <= rec.collaborative_offset {
            return Err(invalid(
                "similar_to_viewed_offset",
                rec.similar_to_viewed_offset.to_string(),
                "must exceed collaborative_offset",
            ));
        }

        let bands = &rec.price_bands;
        if !(bands.close > 0.0 && bands.close <= bands.near) {
            return Err(invalid(
                "price_bands",
                format!("{}/{}", bands.close, bands.near),
                "expected 0 < close <= near",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: String, reason: &str) -> BazaarError {
    BazaarError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}

fn env_parse<T: std::str::FromStr>(key: &str) -> BazaarResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(key, raw, "not a valid number")),
        Err(_) => Ok(None),
    }
}

// =============================================================================
// TESTS
// =============================================================================
