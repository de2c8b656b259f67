//! Key-value cache store boundary.

use bazaar_core::CacheError;
use std::time::Duration;

/// Result type for raw cache store operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Byte-oriented key-value store with per-key expiration.
///
/// This is the only surface the cache services need from Redis, LMDB or
/// the in-memory store. Every call is a blocking round-trip; connection
/// and I/O timeouts belong to the implementation and surface as
/// [`CacheError::Unavailable`].
///
/// # Patterns
///
/// `keys_matching` takes Redis-style globs (`*`, `?`, `[...]`, `\`
/// escapes), see [`super::glob`].
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Write `value` under `key`. A zero `ttl` stores the key without expiry.
    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Returns whether the key existed.
    fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Batch delete. Returns how many of the keys existed.
    fn delete_many(&self, keys: &[String]) -> CacheResult<u64>;

    fn exists(&self, key: &str) -> CacheResult<bool>;

    fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>>;

    /// Remaining time to live; `None` when the key is absent or never expires.
    fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;

    fn ping(&self) -> CacheResult<()>;

    /// Short name used in logs and health reports.
    fn backend_name(&self) -> &'static str;
}
