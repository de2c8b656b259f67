//! Redis-backed key-value store.
//!
//! Requires the `redis` feature. Uses a single blocking connection guarded
//! by a mutex; connect and I/O timeouts come from [`RedisConfig`].

use std::sync::Mutex;
use std::time::Duration;

use bazaar_core::CacheError;
use redis::{Commands, Connection};

use super::store::{CacheResult, KeyValueStore};

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    pub connect_timeout: Duration,
    /// Read and write timeout for each command
    pub operation_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(2),
        }
    }
}

impl RedisConfig {
    /// Read `BAZAAR_REDIS_URL`, `BAZAAR_REDIS_CONNECT_TIMEOUT_SECS` and
    /// `BAZAAR_REDIS_OPERATION_TIMEOUT_SECS`, falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("BAZAAR_REDIS_URL").unwrap_or(defaults.url),
            connect_timeout: env_secs("BAZAAR_REDIS_CONNECT_TIMEOUT_SECS")
                .unwrap_or(defaults.connect_timeout),
            operation_timeout: env_secs("BAZAAR_REDIS_OPERATION_TIMEOUT_SECS")
                .unwrap_or(defaults.operation_timeout),
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Redis-backed store.
pub struct RedisKeyValueStore {
    conn: Mutex<Connection>,
}

impl RedisKeyValueStore {
    pub fn connect(config: &RedisConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(unavailable)?;
        let conn = client
            .get_connection_with_timeout(config.connect_timeout)
            .map_err(unavailable)?;
        conn.set_read_timeout(Some(config.operation_timeout))
            .map_err(unavailable)?;
        conn.set_write_timeout(Some(config.operation_timeout))
            .map_err(unavailable)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Connection) -> redis::RedisResult<T>,
    ) -> CacheResult<T> {
        let mut conn = self.conn.lock().map_err(|_| CacheError::Backend {
            operation,
            reason: "connection lock poisoned".to_string(),
        })?;
        f(&mut conn).map_err(|e| classify(operation, e))
    }
}

fn unavailable(e: redis::RedisError) -> CacheError {
    CacheError::Unavailable {
        reason: e.to_string(),
    }
}

fn classify(operation: &'static str, e: redis::RedisError) -> CacheError {
    if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal() {
        unavailable(e)
    } else {
        CacheError::Backend {
            operation,
            reason: e.to_string(),
        }
    }
}

impl KeyValueStore for RedisKeyValueStore {
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.with_conn("GET", |c| c.get(key))
    }

    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        if ttl.is_zero() {
            self.with_conn("SET", |c| c.set(key, value))
        } else {
            // SET EX takes whole seconds; round sub-second TTLs up.
            let secs = ttl.as_secs().max(1);
            self.with_conn("SETEX", |c| c.set_ex(key, value, secs))
        }
    }

    fn delete(&self, key: &str) -> CacheResult<bool> {
        let removed: u64 = self.with_conn("DEL", |c| c.del(key))?;
        Ok(removed > 0)
    }

    fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.with_conn("DEL", |c| c.del(keys))
    }

    fn exists(&self, key: &str) -> CacheResult<bool> {
        self.with_conn("EXISTS", |c| c.exists(key))
    }

    fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.with_conn("KEYS", |c| c.keys(pattern))
    }

    fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        // -2: missing, -1: no expiry
        let secs: i64 = self.with_conn("TTL", |c| c.ttl(key))?;
        Ok((secs >= 0).then(|| Duration::from_secs(secs as u64)))
    }

    fn ping(&self) -> CacheResult<()> {
        let _: String = self.with_conn("PING", |c| redis::cmd("PING").query(c))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
