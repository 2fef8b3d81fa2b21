//! Cache Entry Module
//!
//! Defines the stored form of a value and its per-entry bookkeeping.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::ByteSized;
use crate::error::Result;

// == Cache Value ==
/// Capability bundle required of values stored in a cache.
///
/// A value must report its estimated footprint, be cloneable for hand-back,
/// and round-trip through the serialization codec. Blanket-implemented for
/// every type with those capabilities.
pub trait CacheValue: ByteSized + Clone + Serialize + DeserializeOwned {}

impl<T> CacheValue for T where T: ByteSized + Clone + Serialize + DeserializeOwned {}

// == Payload ==
/// Stored form of a value: live, or an opaque serialized byte sequence.
#[derive(Debug, Clone)]
pub enum Payload<V> {
    /// The value as handed in by the caller
    Live(V),
    /// The codec's byte form, produced when the value met the serialize
    /// threshold
    Serialized(Vec<u8>),
}

impl<V: CacheValue> Payload<V> {
    /// Chooses the stored form for a value against the serialize threshold.
    ///
    /// A `None` threshold disables serialization. Values whose live estimate
    /// meets the threshold are encoded; encoding failures surface before any
    /// cache state changes.
    pub(crate) fn encode(value: V, serialize_threshold: Option<usize>) -> Result<Self> {
        match serialize_threshold {
            Some(threshold) if value.byte_size() >= threshold => {
                let bytes = bincode::serialize(&value)?;
                Ok(Payload::Serialized(bytes))
            }
            _ => Ok(Payload::Live(value)),
        }
    }

    /// Returns the bytes charged against the memory limit for this form.
    ///
    /// Serialized payloads charge the byte sequence plus the container
    /// header, not the live value they decode to.
    pub(crate) fn charged_bytes(&self) -> usize {
        match self {
            Payload::Live(value) => value.byte_size(),
            Payload::Serialized(bytes) => bytes.byte_size(),
        }
    }

    /// Returns the live value, decoding the byte form when needed.
    pub(crate) fn value(&self) -> Result<V> {
        match self {
            Payload::Live(value) => Ok(value.clone()),
            Payload::Serialized(bytes) => Ok(bincode::deserialize(bytes)?),
        }
    }

    /// Returns true if this payload is stored in serialized form.
    pub fn is_serialized(&self) -> bool {
        matches!(self, Payload::Serialized(_))
    }
}

// == Cache Entry ==
/// A stored payload together with its charge and policy metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored form of the value
    pub(crate) payload: Payload<V>,
    /// Bytes charged against the memory limit at admission time
    pub(crate) charged_bytes: usize,
    /// Monotonic counter stamp; last-access order under LRU, addition order
    /// under LRA, tie-break order under LFU
    pub(crate) stamp: u64,
    /// Access count; meaningful only under LFU
    pub(crate) frequency: u64,
}

impl<V: CacheValue> CacheEntry<V> {
    /// Creates an entry for a freshly admitted payload.
    pub(crate) fn new(payload: Payload<V>, stamp: u64) -> Self {
        let charged_bytes = payload.charged_bytes();
        Self {
            payload,
            charged_bytes,
            stamp,
            frequency: 1,
        }
    }
}
