//! Cache store selection.

use std::path::PathBuf;
use std::sync::Arc;

use bazaar_core::{BazaarResult, ConfigError};

use super::lmdb::LmdbKeyValueStore;
use super::memory::InMemoryKeyValueStore;
use super::store::KeyValueStore;

#[cfg(feature = "redis")]
use super::redis_store::{RedisConfig, RedisKeyValueStore};

const DEFAULT_LMDB_PATH: &str = "./data/cache";
const DEFAULT_LMDB_MAP_MB: usize = 256;

/// Which key-value store backs the cache.
#[derive(Debug, Clone)]
pub enum CacheBackendConfig {
    Memory,
    Lmdb { path: PathBuf, max_size_mb: usize },
    #[cfg(feature = "redis")]
    Redis(RedisConfig),
}

impl CacheBackendConfig {
    /// Read `BAZAAR_CACHE_BACKEND` (`memory`, `lmdb` or `redis`, default
    /// `memory`) plus `BAZAAR_LMDB_PATH` / `BAZAAR_LMDB_MAP_MB` for LMDB.
    pub fn from_env() -> BazaarResult<Self> {
        let backend =
            std::env::var("BAZAAR_CACHE_BACKEND").unwrap_or_else(|_| "memory".to_string());
        Self::parse(&backend)
    }

    fn parse(backend: &str) -> BazaarResult<Self> {
        match backend.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackendConfig::Memory),
            "lmdb" => {
                let path = std::env::var("BAZAAR_LMDB_PATH")
                    .unwrap_or_else(|_| DEFAULT_LMDB_PATH.to_string());
                let max_size_mb = match std::env::var("BAZAAR_LMDB_MAP_MB") {
                    Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                        field: "BAZAAR_LMDB_MAP_MB".to_string(),
                        value: raw.clone(),
                        reason: "not a valid size".to_string(),
                    })?,
                    Err(_) => DEFAULT_LMDB_MAP_MB,
                };
                Ok(CacheBackendConfig::Lmdb {
                    path: PathBuf::from(path),
                    max_size_mb,
                })
            }
            #[cfg(feature = "redis")]
            "redis" => Ok(CacheBackendConfig::Redis(RedisConfig::from_env())),
            other => Err(ConfigError::BackendNotSupported {
                backend: other.to_string(),
            }
            .into()),
        }
    }

    pub fn open(&self) -> BazaarResult<Arc<dyn KeyValueStore>> {
        let store: Arc<dyn KeyValueStore> = match self {
            CacheBackendConfig::Memory => Arc::new(InMemoryKeyValueStore::new()),
            CacheBackendConfig::Lmdb { path, max_size_mb } => {
                let store = LmdbKeyValueStore::new(path, *max_size_mb)
                    .map_err(bazaar_core::CacheError::from)?;
                Arc::new(store)
            }
            #[cfg(feature = "redis")]
            CacheBackendConfig::Redis(config) => Arc::new(RedisKeyValueStore::connect(config)?),
        };
        tracing::info!(backend = store.backend_name(), "Cache store opened");
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::BazaarError;

    #[test]
    fn test_parse_memory() {
        assert!(matches!(
            CacheBackendConfig::parse("Memory").unwrap(),
            CacheBackendConfig::Memory
        ));
    }

    #[test]
    fn test_parse_unknown_backend() {
        let err = CacheBackendConfig::parse("memcached").unwrap_err();
        assert!(matches!(
            err,
            BazaarError::Config(ConfigError::BackendNotSupported { ref backend })
                if backend == "memcached"
        ));
    }

    #[test]
    fn test_open_lmdb() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = CacheBackendConfig::Lmdb {
            path: dir.path().to_path_buf(),
            max_size_mb: 10,
        };
        let store = config.open().unwrap();
        assert_eq!(store.backend_name(), "lmdb");
        assert!(store.ping().is_ok());
    }
}
