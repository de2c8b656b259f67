//! Error types for Bazaar operations

use thiserror::Error;

/// Errors raised by the stores of record (catalog, interaction graph, cart).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{store} store unavailable: {reason}")]
    Unavailable { store: &'static str, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Errors raised by the key-value cache and its codec.
///
/// The cache services never let these escape; they are logged and the
/// request falls back to the store of record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache backend error during {operation}: {reason}")]
    Backend { operation: &'static str, reason: String },

    #[error("Undecodable cache value at {key}: {reason}")]
    Decode { key: String, reason: String },

    #[error("Failed to encode cache value: {reason}")]
    Encode { reason: String },

    #[error("Invalid key pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: i32,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Cache backend not supported: {backend}")]
    BackendNotSupported { backend: String },
}

/// Master error type for all Bazaar errors.
#[derive(Debug, Clone, Error)]
pub enum BazaarError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Bazaar operations.
pub type BazaarResult<T> = Result<T, BazaarError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity: "product",
            id: "p-1".to_string(),
        };
        assert_eq!(format!("{}", err), "product not found: p-1");
    }

    #[test]
    fn test_insufficient_stock_display() {
        let err = ValidationError::InsufficientStock {
            product_id: "p-1".to_string(),
            requested: 5,
            available: 2,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("requested 5"));
        assert!(msg.contains("available 2"));
    }

    #[test]
    fn test_master_error_from_conversions() {
        let err: BazaarError = CacheError::Unavailable {
            reason: "connection refused".to_string(),
        }
        .into();
        assert!(matches!(err, BazaarError::Cache(CacheError::Unavailable { .. })));
        assert!(format!("{}", err).starts_with("Cache error:"));

        let err: BazaarError = StorageError::LockPoisoned.into();
        assert!(matches!(err, BazaarError::Storage(StorageError::LockPoisoned)));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "result_limit".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        assert!(format!("{}", err).contains("result_limit"));
    }
}
