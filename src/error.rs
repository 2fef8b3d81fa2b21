//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for all cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Identifier not present in the cache
    #[error("identifier not found: {0}")]
    NotFound(String),

    /// Construction parameter named an unknown eviction mode
    #[error("'{0}' is not a valid eviction mode")]
    InvalidMode(String),

    /// Construction parameter outside the permitted range
    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    /// A single value exceeds the memory limit even with the cache empty
    #[error("value of {needed} bytes exceeds the memory limit of {limit} bytes")]
    CapacityExceeded {
        /// Bytes the rejected value would have charged
        needed: usize,
        /// The cache's configured limit in bytes
        limit: usize,
    },

    /// The codec could not encode or decode a stored value
    #[error("serialization failure: {0}")]
    Serialization(#[from] bincode::Error),
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
