//! Configuration Module
//!
//! Construction parameters for a cache instance, loadable from environment
//! variables.

use std::env;

use crate::cache::EvictionMode;
use crate::error::{CacheError, Result};

/// Cache construction parameters.
///
/// All limits are denominated in megabytes at this boundary and converted to
/// bytes when the store is built. Every field is fixed for the cache's
/// lifetime.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Memory limit in megabytes; must be positive
    pub memory_limit: u64,
    /// Eviction mode applied when the limit is reached
    pub mode: EvictionMode,
    /// Size in megabytes at or above which values are stored serialized;
    /// zero disables serialization
    pub serialize_limit: u64,
}

impl CacheConfig {
    /// Creates a config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMORY_LIMIT_MB` - Memory limit in megabytes (default: 256)
    /// - `EVICTION_MODE` - One of `LRU`, `LRA`, `LFU` (default: LRU)
    /// - `SERIALIZE_LIMIT_MB` - Serialize threshold in megabytes, 0 disables
    ///   (default: 0)
    ///
    /// An unrecognized `EVICTION_MODE` is an error; absent or unparsable
    /// numeric variables fall back to their defaults.
    pub fn from_env() -> Result<Self> {
        let mode = match env::var("EVICTION_MODE") {
            Ok(tag) => tag.parse()?,
            Err(_) => EvictionMode::default(),
        };

        Ok(Self {
            memory_limit: env::var("MEMORY_LIMIT_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(256),
            mode,
            serialize_limit: env::var("SERIALIZE_LIMIT_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        })
    }

    /// Checks the parameters against their permitted ranges.
    pub fn validate(&self) -> Result<()> {
        if self.memory_limit == 0 {
            return Err(CacheError::InvalidLimit(
                "memory_limit must be a positive number of megabytes".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_limit: 256,
            mode: EvictionMode::Lru,
            serialize_limit: 0,
        }
    }
}
