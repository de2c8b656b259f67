//! Failure-absorbing primitives shared by the cache services.
//!
//! Every cache operation in the services goes through these helpers so the
//! same rules hold everywhere: a store failure is logged and reported as a
//! miss, and a value that does not decode is deleted before reporting a
//! miss. Nothing here returns an error.

use std::time::Duration;

use super::codec::{self, CacheableValue};
use super::store::KeyValueStore;

/// Outcome of a tolerant cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRead<T> {
    Hit(T),
    Miss,
    /// The store could not be reached; callers fall back to the store of record.
    Unavailable,
    /// An undecodable value was found and deleted.
    Healed,
}

impl<T> CacheRead<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            CacheRead::Hit(value) => Some(value),
            _ => None,
        }
    }
}

pub(crate) fn read<T, S>(store: &S, key: &str) -> CacheRead<T>
where
    T: CacheableValue,
    S: KeyValueStore + ?Sized,
{
    let bytes = match store.get(key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return CacheRead::Miss,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Cache read failed, falling back");
            return CacheRead::Unavailable;
        }
    };

    match codec::decode::<T>(key, &bytes) {
        Ok(value) => CacheRead::Hit(value),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
            delete(store, key);
            CacheRead::Healed
        }
    }
}

/// Encode and store `value`. Returns whether the write landed.
pub(crate) fn write<T, S>(store: &S, key: &str, value: &T, ttl: Duration) -> bool
where
    T: CacheableValue,
    S: KeyValueStore + ?Sized,
{
    let bytes = match codec::encode(value) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Cache encode failed");
            return false;
        }
    };
    match store.set(key, &bytes, ttl) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Cache write failed");
            false
        }
    }
}

pub(crate) fn delete<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> bool {
    match store.delete(key) {
        Ok(existed) => existed,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Cache delete failed");
            false
        }
    }
}

pub(crate) fn delete_many<S: KeyValueStore + ?Sized>(store: &S, keys: &[String]) -> u64 {
    if keys.is_empty() {
        return 0;
    }
    match store.delete_many(keys) {
        Ok(removed) => removed,
        Err(e) => {
            // Leftovers expire on their own TTL.
            tracing::warn!(count = keys.len(), error = %e, "Cache batch delete failed");
            0
        }
    }
}

pub(crate) fn keys<S: KeyValueStore + ?Sized>(store: &S, pattern: &str) -> Vec<String> {
    match store.keys_matching(pattern) {
        Ok(keys) => keys,
        Err(e) => {
            tracing::warn!(pattern = %pattern, error = %e, "Cache key scan failed");
            Vec::new()
        }
    }
}
