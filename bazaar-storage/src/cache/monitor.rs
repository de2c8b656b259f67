//! Administrative view over the cache store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bazaar_core::{CacheNamespace, HealthCheck};
use serde::{Deserialize, Serialize};

use super::read_through;
use super::store::KeyValueStore;

/// Key used for the connectivity probe. It is read, never written.
const PROBE_KEY: &str = "test";

/// Key counts per cache namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub product_cache_count: u64,
    pub cart_items_cache_count: u64,
    /// Sum of the two namespace counts above.
    pub total_cache_keys: u64,
}

pub struct CacheMonitor<S: ?Sized> {
    store: Arc<S>,
}

impl<S: KeyValueStore + ?Sized> CacheMonitor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Counts by namespace. An unreachable store reports zeros.
    pub fn statistics(&self) -> CacheStatistics {
        let product_cache_count =
            read_through::keys(&*self.store, &CacheNamespace::Product.pattern()).len() as u64;
        let cart_items_cache_count =
            read_through::keys(&*self.store, &CacheNamespace::CartItem.pattern()).len() as u64;
        CacheStatistics {
            product_cache_count,
            cart_items_cache_count,
            total_cache_keys: product_cache_count + cart_items_cache_count,
        }
    }

    /// One trivial read; any failure means "not connected".
    pub fn is_connected(&self) -> bool {
        match self.store.get(PROBE_KEY) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    backend = self.store.backend_name(),
                    error = %e,
                    "Cache connectivity probe failed"
                );
                false
            }
        }
    }

    /// Delete every key in the store. Returns how many were removed.
    pub fn clear_all(&self) -> u64 {
        let keys = read_through::keys(&*self.store, "*");
        let removed = read_through::delete_many(&*self.store, &keys);
        tracing::info!(backend = self.store.backend_name(), removed, "Cleared cache");
        removed
    }

    /// Remaining TTL of an arbitrary key; `None` when absent, persistent or unreachable.
    pub fn key_ttl(&self, key: &str) -> Option<Duration> {
        match self.store.ttl(key) {
            Ok(ttl) => ttl,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache TTL lookup failed");
                None
            }
        }
    }

    /// Timed ping plus namespace counts.
    pub fn health(&self) -> HealthCheck {
        let component = format!("cache:{}", self.store.backend_name());
        let started = Instant::now();
        let ping = self.store.ping();
        let elapsed_ms = started.elapsed().as_millis() as i64;

        match ping {
            Ok(()) => {
                let stats = self.statistics();
                HealthCheck::healthy(component)
                    .with_response_time(elapsed_ms)
                    .with_detail("total_cache_keys", stats.total_cache_keys.into())
            }
            Err(e) => {
                HealthCheck::unhealthy(component, e.to_string()).with_response_time(elapsed_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryKeyValueStore;

    const HOUR: Duration = Duration::from_secs(3600);

    fn seeded() -> (CacheMonitor<InMemoryKeyValueStore>, Arc<InMemoryKeyValueStore>) {
        let store = Arc::new(InMemoryKeyValueStore::new());
        store.set("product:a", b"1", HOUR).unwrap();
        store.set("product:b", b"1", HOUR).unwrap();
        store.set("cart_items:c:a", b"1", HOUR).unwrap();
        store.set("order_cooldown:c", b"1", HOUR).unwrap();
        (CacheMonitor::new(store.clone()), store)
    }

    #[test]
    fn test_statistics_counts_namespaces() {
        let (monitor, _) = seeded();
        assert_eq!(
            monitor.statistics(),
            CacheStatistics {
                product_cache_count: 2,
                cart_items_cache_count: 1,
                total_cache_keys: 3,
            }
        );
    }

    #[test]
    fn test_clear_all_removes_everything() {
        let (monitor, store) = seeded();
        assert_eq!(monitor.clear_all(), 4);
        assert!(store.is_empty());
        assert_eq!(monitor.statistics().total_cache_keys, 0);
    }

    #[test]
    fn test_connectivity_and_health_follow_store() {
        let (monitor, store) = seeded();
        assert!(monitor.is_connected());
        assert!(monitor.health().is_healthy());

        store.set_unavailable(true);
        assert!(!monitor.is_connected());
        let health = monitor.health();
        assert!(!health.is_healthy());
        assert_eq!(health.component, "cache:memory");
        assert_eq!(monitor.statistics(), CacheStatistics::default());
    }

    #[test]
    fn test_key_ttl() {
        let (monitor, _) = seeded();
        assert!(monitor.key_ttl("product:a").unwrap() <= HOUR);
        assert_eq!(monitor.key_ttl("product:zzz"), None);
    }
}
