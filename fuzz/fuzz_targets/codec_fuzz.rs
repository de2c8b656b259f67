//! Fuzz target for the cache value codec
//!
//! Cache entries may be written by older builds or other services, so the
//! decoder sees arbitrary bytes. It must return Ok or Err, never panic.
//!
//! Run with: cargo +nightly fuzz run codec_fuzz -- -max_total_time=60

#![no_main]

use bazaar_core::{CachedCartItem, ProductSummary};
use bazaar_storage::cache::codec::{decode, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(product) = decode::<ProductSummary>("product:fuzz", data) {
        // Whatever decodes must be writable again.
        encode(&product).expect("encode decoded product");
    }

    if let Ok(item) = decode::<CachedCartItem>("cart_items:fuzz:fuzz", data) {
        assert!(item.quantity > 0, "decoded cart line with zero quantity");
    }
});
