//! LMDB-backed key-value store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to give the cache a
//! persistent, memory-mapped home when no Redis server is available.
//!
//! # Value Layout
//!
//! Every value is stored as `[expires_at_ms: i64 big-endian][payload]`.
//! An `expires_at_ms` of 0 means the key never expires. Expired keys are
//! invisible to reads and are removed by [`LmdbKeyValueStore::purge_expired`]
//! or overwritten by the next write. A value too short to hold the header
//! is deleted by the first read that meets it, and stays visible to scans
//! until then so it can be cleared.

use std::path::Path;
use std::time::Duration;

use bazaar_core::CacheError;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::glob::GlobPattern;
use super::store::{CacheResult, KeyValueStore};

const HEADER_LEN: usize = 8;

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for CacheError {
    fn from(e: LmdbCacheError) -> Self {
        match e {
            LmdbCacheError::EnvOpen(reason) => CacheError::Unavailable { reason },
            other => CacheError::Backend {
                operation: "lmdb",
                reason: other.to_string(),
            },
        }
    }
}

fn txn_err(e: heed::Error) -> LmdbCacheError {
    LmdbCacheError::Transaction(e.to_string())
}

/// LMDB-backed key-value store.
///
/// # Example
///
/// ```ignore
/// use bazaar_storage::cache::LmdbKeyValueStore;
///
/// let store = LmdbKeyValueStore::new("/var/cache/bazaar", 256)?;
/// store.set("product:p-1", b"{...}", Duration::from_secs(3600))?;
/// ```
pub struct LmdbKeyValueStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbKeyValueStore {
    /// Open (or create) a store under `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the map in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        Ok(Self { env, db })
    }

    /// Remove every expired key. Returns how many were dropped.
    pub fn purge_expired(&self) -> CacheResult<u64> {
        let now = now_ms();
        let expired: Vec<Vec<u8>> = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            let iter = self.db.iter(&rtxn).map_err(txn_err)?;
            let mut expired = Vec::new();
            for item in iter {
                let (key, value) = item.map_err(txn_err)?;
                if split_header(value).map_or(true, |(expires_at, _)| is_past(expires_at, now)) {
                    expired.push(key.to_vec());
                }
            }
            expired
        };

        if expired.is_empty() {
            return Ok(0);
        }

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let mut removed = 0;
        for key in &expired {
            if self.db.delete(&mut wtxn, key).map_err(txn_err)? {
                removed += 1;
            }
        }
        wtxn.commit().map_err(txn_err)?;
        Ok(removed)
    }

    fn read_live(&self, key: &str) -> CacheResult<Option<(i64, Vec<u8>)>> {
        let raw = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            match self.db.get(&rtxn, key.as_bytes()).map_err(txn_err)? {
                Some(raw) => raw.to_vec(),
                None => return Ok(None),
            }
        };
        let Some((expires_at, payload)) = split_header(&raw) else {
            tracing::warn!(
                key = %key,
                len = raw.len(),
                "Dropping LMDB value with a truncated header"
            );
            self.remove_raw(key)?;
            return Ok(None);
        };
        if is_past(expires_at, now_ms()) {
            return Ok(None);
        }
        Ok(Some((expires_at, payload.to_vec())))
    }

    fn remove_raw(&self, key: &str) -> CacheResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.db.delete(&mut wtxn, key.as_bytes()).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }
}

impl KeyValueStore for LmdbKeyValueStore {
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.read_live(key)?.map(|(_, payload)| payload))
    }

    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let expires_at = if ttl.is_zero() {
            0
        } else {
            now_ms().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
        };
        let mut buf = Vec::with_capacity(HEADER_LEN + value.len());
        buf.extend_from_slice(&expires_at.to_be_bytes());
        buf.extend_from_slice(value);

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &buf)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<bool> {
        let live = self.read_live(key)?.is_some();
        self.remove_raw(key)?;
        Ok(live)
    }

    fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        let now = now_ms();
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let mut removed = 0;
        for key in keys {
            let live = match self.db.get(&wtxn, key.as_bytes()).map_err(txn_err)? {
                Some(raw) => is_visible(raw, now),
                None => false,
            };
            self.db.delete(&mut wtxn, key.as_bytes()).map_err(txn_err)?;
            if live {
                removed += 1;
            }
        }
        wtxn.commit().map_err(txn_err)?;
        Ok(removed)
    }

    fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.read_live(key)?.is_some())
    }

    fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let glob = GlobPattern::compile(pattern)?;
        let now = now_ms();
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let iter = self.db.iter(&rtxn).map_err(txn_err)?;

        let mut keys = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(txn_err)?;
            if !is_visible(value, now) {
                continue;
            }
            if let Ok(key) = std::str::from_utf8(key) {
                if glob.matches(key) {
                    keys.push(key.to_string());
                }
            }
        }
        Ok(keys)
    }

    fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        Ok(self.read_live(key)?.and_then(|(expires_at, _)| {
            (expires_at != 0).then(|| Duration::from_millis((expires_at - now_ms()).max(0) as u64))
        }))
    }

    fn ping(&self) -> CacheResult<()> {
        let _rtxn = self.env.read_txn().map_err(txn_err)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "lmdb"
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn split_header(raw: &[u8]) -> Option<(i64, &[u8])> {
    if raw.len() < HEADER_LEN {
        return None;
    }
    let (header, payload) = raw.split_at(HEADER_LEN);
    let mut bytes = [0u8; HEADER_LEN];
    bytes.copy_from_slice(header);
    Some((i64::from_be_bytes(bytes), payload))
}

fn is_past(expires_at: i64, now: i64) -> bool {
    expires_at != 0 && expires_at <= now
}

/// Unexpired, or corrupt and still waiting to be dropped.
fn is_visible(raw: &[u8], now: i64) -> bool {
    split_header(raw).map_or(true, |(expires_at, _)| !is_past(expires_at, now))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn create_test_store() -> (LmdbKeyValueStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = LmdbKeyValueStore::new(temp_dir.path(), 10).expect("Failed to open store");
        (store, temp_dir)
    }

    #[test]
    fn test_set_and_get() {
        let (store, _dir) = create_test_store();
        store.set("product:p-1", b"payload", HOUR).unwrap();
        assert_eq!(store.get("product:p-1").unwrap(), Some(b"payload".to_vec()));
        assert_eq!(store.get("product:p-2").unwrap(), None);
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let (store, _dir) = create_test_store();
        store.set("k", b"old", HOUR).unwrap();
        store.set("k", b"new", HOUR).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn test_expired_value_is_invisible_and_purged() {
        let (store, _dir) = create_test_store();
        store.set("short", b"v", Duration::from_millis(10)).unwrap();
        store.set("long", b"v", HOUR).unwrap();
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(store.get("short").unwrap(), None);
        assert_eq!(store.keys_matching("*").unwrap(), vec!["long".to_string()]);
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.purge_expired().unwrap(), 0);
    }

    #[test]
    fn test_delete_and_delete_many() {
        let (store, _dir) = create_test_store();
        store.set("cart_items:c:a", b"1", HOUR).unwrap();
        store.set("cart_items:c:b", b"2", HOUR).unwrap();
        store.set("cart_items:c:c", b"3", HOUR).unwrap();

        assert!(store.delete("cart_items:c:a").unwrap());
        assert!(!store.delete("cart_items:c:a").unwrap());

        let removed = store
            .delete_many(&["cart_items:c:b".to_string(), "cart_items:c:zz".to_string()])
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.keys_matching("cart_items:c:*").unwrap(), vec!["cart_items:c:c"]);
    }

    #[test]
    fn test_ttl_reporting() {
        let (store, _dir) = create_test_store();
        store.set("k", b"v", HOUR).unwrap();
        store.set("forever", b"v", Duration::ZERO).unwrap();

        let remaining = store.ttl("k").unwrap().unwrap();
        assert!(remaining <= HOUR && remaining > HOUR - Duration::from_secs(5));
        assert_eq!(store.ttl("forever").unwrap(), None);
        assert!(store.exists("forever").unwrap());
        assert_eq!(store.ttl("missing").unwrap(), None);
    }

    #[test]
    fn test_truncated_header_is_dropped() {
        let (store, _dir) = create_test_store();
        for (key, raw) in [("cart_items:c:p", &b""[..]), ("product:p-1", &b"abc"[..])] {
            let mut wtxn = store.env.write_txn().unwrap();
            store.db.put(&mut wtxn, key.as_bytes(), raw).unwrap();
            wtxn.commit().unwrap();
        }

        // Visible to scans so namespace clears can reach it.
        assert_eq!(
            store.keys_matching("*").unwrap(),
            vec!["cart_items:c:p".to_string(), "product:p-1".to_string()]
        );

        assert_eq!(store.get("product:p-1").unwrap(), None);
        assert!(!store.exists("product:p-1").unwrap());
        assert_eq!(store.keys_matching("*").unwrap(), vec!["cart_items:c:p".to_string()]);

        assert_eq!(store.delete_many(&["cart_items:c:p".to_string()]).unwrap(), 1);
        assert!(store.keys_matching("*").unwrap().is_empty());
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let (store, _dir) = create_test_store();
        store.set("k", b"v", Duration::MAX).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
        let remaining = store.ttl("k").unwrap().unwrap();
        assert!(remaining > Duration::from_secs(100 * 365 * 24 * 3600));
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = LmdbKeyValueStore::new(temp_dir.path(), 10).unwrap();
            store.set("product:p", b"kept", HOUR).unwrap();
        }
        let store = LmdbKeyValueStore::new(temp_dir.path(), 10).unwrap();
        assert_eq!(store.get("product:p").unwrap(), Some(b"kept".to_vec()));
        assert!(store.ping().is_ok());
    }
}
