//! Cache key layout.
//!
//! ```text
//! product:{product_id}
//! cart_items:{customer_id}:{product_id}
//! order_cooldown:{customer_id}
//! ```
//!
//! Keys are only ever built through [`CacheKey`], so every service agrees
//! on the layout. Ids are percent-encoded (`%` and `:` only) so a segment
//! never contains the separator, and scan patterns escape them once more
//! for the glob syntax.

use bazaar_core::{CacheNamespace, CustomerId, ProductId};
use std::fmt;

use super::glob;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Product(ProductId),
    CartItem {
        customer: CustomerId,
        product: ProductId,
    },
    OrderCooldown(CustomerId),
}

impl CacheKey {
    pub fn product(id: &ProductId) -> Self {
        CacheKey::Product(id.clone())
    }

    pub fn cart_item(customer: &CustomerId, product: &ProductId) -> Self {
        CacheKey::CartItem {
            customer: customer.clone(),
            product: product.clone(),
        }
    }

    pub fn order_cooldown(customer: &CustomerId) -> Self {
        CacheKey::OrderCooldown(customer.clone())
    }

    pub fn namespace(&self) -> CacheNamespace {
        match self {
            CacheKey::Product(_) => CacheNamespace::Product,
            CacheKey::CartItem { .. } => CacheNamespace::CartItem,
            CacheKey::OrderCooldown(_) => CacheNamespace::OrderCooldown,
        }
    }

    pub fn encode(&self) -> String {
        let prefix = self.namespace().prefix();
        match self {
            CacheKey::Product(id) => format!("{}{}", prefix, encode_segment(id.as_str())),
            CacheKey::CartItem { customer, product } => format!(
                "{}{}:{}",
                prefix,
                encode_segment(customer.as_str()),
                encode_segment(product.as_str())
            ),
            CacheKey::OrderCooldown(customer) => {
                format!("{}{}", prefix, encode_segment(customer.as_str()))
            }
        }
    }

    /// Inverse of [`encode`](Self::encode). Keys outside the known namespaces,
    /// or with a malformed segment, yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(rest) = raw.strip_prefix(CacheNamespace::Product.prefix()) {
            return decode_segment(rest).map(|id| CacheKey::Product(ProductId::new(id)));
        }
        if let Some(rest) = raw.strip_prefix(CacheNamespace::CartItem.prefix()) {
            let (customer, product) = rest.split_once(':')?;
            return Some(CacheKey::CartItem {
                customer: CustomerId::new(decode_segment(customer)?),
                product: ProductId::new(decode_segment(product)?),
            });
        }
        if let Some(rest) = raw.strip_prefix(CacheNamespace::OrderCooldown.prefix()) {
            return decode_segment(rest).map(|id| CacheKey::OrderCooldown(CustomerId::new(id)));
        }
        None
    }

    /// Every cart entry of one customer.
    pub fn customer_cart_pattern(customer: &CustomerId) -> String {
        format!(
            "{}{}:*",
            CacheNamespace::CartItem.prefix(),
            glob::escape(&encode_segment(customer.as_str()))
        )
    }

    /// The entries for one product across all customers' carts.
    pub fn product_in_carts_pattern(product: &ProductId) -> String {
        format!(
            "{}*:{}",
            CacheNamespace::CartItem.prefix(),
            glob::escape(&encode_segment(product.as_str()))
        )
    }
}

fn encode_segment(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            other => out.push(other),
        }
    }
    out
}

/// Empty segments, stray separators and unknown escapes are rejected.
fn decode_segment(segment: &str) -> Option<String> {
    if segment.is_empty() {
        return None;
    }
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        match c {
            ':' => return None,
            '%' => {
                let escape: String = chars.by_ref().take(2).collect();
                match escape.to_ascii_uppercase().as_str() {
                    "25" => out.push('%'),
                    "3A" => out.push(':'),
                    _ => return None,
                }
            }
            other => out.push(other),
        }
    }
    Some(out)
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::glob::GlobPattern;

    #[test]
    fn test_encode_layout() {
        let c = CustomerId::new("c-1");
        let p = ProductId::new("p-1");
        assert_eq!(CacheKey::product(&p).encode(), "product:p-1");
        assert_eq!(CacheKey::cart_item(&c, &p).encode(), "cart_items:c-1:p-1");
        assert_eq!(CacheKey::order_cooldown(&c).encode(), "order_cooldown:c-1");
    }

    #[test]
    fn test_parse_inverts_encode() {
        let keys = [
            CacheKey::product(&ProductId::new("p-1")),
            CacheKey::cart_item(&CustomerId::new("c-1"), &ProductId::new("p-2")),
            CacheKey::order_cooldown(&CustomerId::new("c-9")),
        ];
        for key in keys {
            assert_eq!(CacheKey::parse(&key.encode()), Some(key));
        }
        assert_eq!(CacheKey::parse("session:abc"), None);
        assert_eq!(CacheKey::parse("cart_items:only-customer"), None);
        assert_eq!(CacheKey::parse("product:"), None);
    }

    #[test]
    fn test_patterns_select_the_right_keys() {
        let customer = CacheKey::customer_cart_pattern(&CustomerId::new("c-1"));
        let customer = GlobPattern::compile(&customer).unwrap();
        assert!(customer.matches("cart_items:c-1:p-1"));
        assert!(!customer.matches("cart_items:c-10:p-1"));

        let product = CacheKey::product_in_carts_pattern(&ProductId::new("p-1"));
        let product = GlobPattern::compile(&product).unwrap();
        assert!(product.matches("cart_items:c-1:p-1"));
        assert!(product.matches("cart_items:c-2:p-1"));
        assert!(!product.matches("cart_items:c-1:p-12"));
    }

    #[test]
    fn test_colons_stay_inside_their_segment() {
        let tricky = CustomerId::new("alice:evil");
        let product = ProductId::new("x:p%");
        let key = CacheKey::cart_item(&tricky, &product);
        assert_eq!(key.encode(), "cart_items:alice%3Aevil:x%3Ap%25");
        assert_eq!(CacheKey::parse(&key.encode()), Some(key.clone()));

        let alice = CacheKey::customer_cart_pattern(&CustomerId::new("alice"));
        let alice = GlobPattern::compile(&alice).unwrap();
        assert!(!alice.matches(&key.encode()));

        let plain = CacheKey::product_in_carts_pattern(&ProductId::new("p"));
        let plain = GlobPattern::compile(&plain).unwrap();
        assert!(!plain.matches(&key.encode()));
        assert!(!plain.matches(
            &CacheKey::cart_item(&CustomerId::new("bob"), &ProductId::new("x:p")).encode()
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_segments() {
        assert_eq!(CacheKey::parse("product:a%2Fb"), None);
        assert_eq!(CacheKey::parse("product:a%3"), None);
        assert_eq!(CacheKey::parse("cart_items:a:b:c"), None);
        assert_eq!(CacheKey::parse("cart_items::b"), None);
    }
}
