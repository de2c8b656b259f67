//! Enum types for Bazaar entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a user-to-product interaction edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionKind {
    /// Idempotent per (user, product); repeat views refresh the timestamp.
    Viewed,
    /// Accumulates quantity across repeat purchases.
    Bought,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Viewed => "VIEWED",
            InteractionKind::Bought => "BOUGHT",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VIEWED" => Ok(InteractionKind::Viewed),
            "BOUGHT" => Ok(InteractionKind::Bought),
            other => Err(format!("unknown interaction kind: {}", other)),
        }
    }
}

/// Key namespaces owned by the cache services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheNamespace {
    Product,
    CartItem,
    OrderCooldown,
}

impl CacheNamespace {
    /// Key prefix, including the trailing separator.
    pub fn prefix(&self) -> &'static str {
        match self {
            CacheNamespace::Product => "product:",
            CacheNamespace::CartItem => "cart_items:",
            CacheNamespace::OrderCooldown => "order_cooldown:",
        }
    }

    /// Glob matching every key in the namespace.
    pub fn pattern(&self) -> String {
        format!("{}*", self.prefix())
    }
}
