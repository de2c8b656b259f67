//! In-process key-value store with lazy expiry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use bazaar_core::CacheError;

use super::glob::GlobPattern;
use super::store::{CacheResult, KeyValueStore};

/// Writes between two sweeps of expired entries.
const SWEEP_EVERY: u64 = 256;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Thread-safe in-memory store.
///
/// Expired entries are invisible to reads and are swept out every
/// [`SWEEP_EVERY`] writes. [`set_unavailable`](Self::set_unavailable) makes
/// every call fail with [`CacheError::Unavailable`], which is how tests
/// exercise the fallback paths of the cache services.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    unavailable: Arc<AtomicBool>,
    writes: Arc<AtomicU64>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a lost connection (or recover from one).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|e| e.values().filter(|v| v.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> CacheResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable {
                reason: "in-memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn poisoned(operation: &'static str) -> CacheError {
        CacheError::Backend {
            operation,
            reason: "lock poisoned".to_string(),
        }
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.check()?;
        let entries = self.entries.read().map_err(|_| Self::poisoned("get"))?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.check()?;
        let mut entries = self.entries.write().map_err(|_| Self::poisoned("set"))?;
        let now = Instant::now();
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            entries.retain(|_, e| e.is_live(now));
        }
        let expires_at = if ttl.is_zero() { None } else { Some(now + ttl) };
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<bool> {
        self.check()?;
        let mut entries = self.entries.write().map_err(|_| Self::poisoned("delete"))?;
        let now = Instant::now();
        Ok(entries.remove(key).is_some_and(|e| e.is_live(now)))
    }

    fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        self.check()?;
        let mut entries = self.entries.write().map_err(|_| Self::poisoned("delete_many"))?;
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter_map(|k| entries.remove(k))
            .filter(|e| e.is_live(now))
            .count();
        Ok(removed as u64)
    }

    fn exists(&self, key: &str) -> CacheResult<bool> {
        self.check()?;
        let entries = self.entries.read().map_err(|_| Self::poisoned("exists"))?;
        let now = Instant::now();
        Ok(entries.get(key).is_some_and(|e| e.is_live(now)))
    }

    fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.check()?;
        let glob = GlobPattern::compile(pattern)?;
        let entries = self.entries.read().map_err(|_| Self::poisoned("keys"))?;
        let now = Instant::now();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, e)| e.is_live(now) && glob.matches(k))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        self.check()?;
        let entries = self.entries.read().map_err(|_| Self::poisoned("ttl"))?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    fn ping(&self) -> CacheResult<()> {
        self.check()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// TESTS
// =============================================================================
