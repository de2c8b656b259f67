//! Entity types for the catalog, cart and interaction graph

use crate::{InteractionKind, ProductId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Product as held by the catalog store of record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i32,
    pub image_url: Option<String>,
    pub category: String,
    pub shop_id: Option<String>,
    pub shop_name: Option<String>,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

/// Response/cache projection of a product.
///
/// Mirrors [`ProductRecord`] and adds the fields derived per request:
/// `purchase_count` and `viewed` from the interaction graph,
/// `interaction_count` carrying the ranking score in recommendation
/// responses, and `quantity` carrying the cart quantity in cart listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    #[serde(alias = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub shop_id: Option<String>,
    #[serde(default)]
    pub shop_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    #[serde(default, alias = "purchaseCount")]
    pub purchase_count: u64,
    #[serde(default)]
    pub viewed: bool,
    #[serde(default, alias = "interactionCount")]
    pub interaction_count: i64,
    #[serde(default)]
    pub quantity: u32,
}

impl ProductSummary {
    /// Project a catalog record with empty derived fields.
    pub fn from_record(record: &ProductRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            price: record.price,
            stock: record.stock,
            image_url: record.image_url.clone(),
            category: record.category.clone(),
            shop_id: record.shop_id.clone(),
            shop_name: record.shop_name.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            purchase_count: 0,
            viewed: false,
            interaction_count: 0,
            quantity: 0,
        }
    }

    /// Placeholder for a cart line whose product left the catalog.
    pub fn unavailable(id: ProductId) -> Self {
        Self {
            id,
            name: "Product unavailable".to_string(),
            description: None,
            price: 0.0,
            stock: 0,
            image_url: None,
            category: String::new(),
            shop_id: None,
            shop_name: None,
            created_at: None,
            updated_at: None,
            purchase_count: 0,
            viewed: false,
            interaction_count: 0,
            quantity: 0,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_interaction_count(mut self, count: i64) -> Self {
        self.interaction_count = count;
        self
    }

    pub fn with_purchase_stats(mut self, purchase_count: u64, viewed: bool) -> Self {
        self.purchase_count = purchase_count;
        self.viewed = viewed;
        self
    }
}

impl From<&ProductRecord> for ProductSummary {
    fn from(record: &ProductRecord) -> Self {
        Self::from_record(record)
    }
}

/// A cart line as cached per (customer, product).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCartItem {
    #[serde(alias = "productId")]
    pub product_id: ProductId,
    pub quantity: u32,
    pub product: ProductSummary,
    /// Milliseconds since the epoch of the last write.
    pub timestamp: i64,
}

impl CachedCartItem {
    pub fn new(product: ProductSummary, quantity: u32, timestamp: i64) -> Self {
        Self {
            product_id: product.id.clone(),
            quantity,
            product,
            timestamp,
        }
    }
}

/// A cart line in the cart store of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Directed `User --kind--> Product` edge in the interaction graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEdge {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub kind: InteractionKind,
    pub timestamp: Timestamp,
    /// Cumulative purchased quantity; `None` on view edges.
    pub quantity: Option<u64>,
}

// =============================================================================
// TESTS
// =============================================================================
