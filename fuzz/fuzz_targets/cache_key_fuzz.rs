//! Fuzz target for cache key parsing and glob matching
//!
//! Run with: cargo +nightly fuzz run cache_key_fuzz -- -max_total_time=60

#![no_main]

use bazaar_storage::cache::glob::{escape, GlobPattern};
use bazaar_storage::CacheKey;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    if let Some(key) = CacheKey::parse(input) {
        let encoded = key.encode();
        if let CacheKey::CartItem { customer, product } = &key {
            let own = GlobPattern::compile(&CacheKey::customer_cart_pattern(customer))
                .expect("cart pattern compiles");
            assert!(own.matches(&encoded));
            let carts = GlobPattern::compile(&CacheKey::product_in_carts_pattern(product))
                .expect("product pattern compiles");
            assert!(carts.matches(&encoded));
        }
        assert_eq!(CacheKey::parse(&encoded), Some(key));
    }

    // An escaped literal matches itself and nothing longer.
    let pattern = GlobPattern::compile(&escape(input)).expect("escaped literal compiles");
    assert!(pattern.matches(input));
    let longer = format!("{}x", input);
    assert!(!pattern.matches(&longer));

    // Arbitrary patterns may be rejected but must not panic.
    if let Ok(pattern) = GlobPattern::compile(input) {
        let _ = pattern.matches(input);
    }
});
