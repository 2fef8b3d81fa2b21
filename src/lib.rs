//! Bytecache - A bounded in-memory key-value cache
//!
//! Stores arbitrary values under string identifiers inside a configurable
//! memory budget. When an insertion would overrun the budget, entries are
//! evicted under one of three policies - LRU (least recently used), LRA
//! (least recently added), or LFU (least frequently used) - until the new
//! value fits. Values at or above an optional size threshold are held in
//! serialized form and transparently restored on read.
//!
//! [`CacheStore`] is the single-threaded engine; [`SharedCache`] wraps it in
//! one exclusion domain for concurrent callers. The adapters in [`memo`]
//! turn plain functions into cached functions on top of either.

pub mod cache;
pub mod config;
pub mod error;
pub mod memo;
pub mod shared;

pub use cache::{ByteSized, CacheStore, CacheValue, EvictionMode, Payload, BYTES_PER_MB};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use memo::{ArgMemo, DepMemo, TagMemo};
pub use shared::SharedCache;
