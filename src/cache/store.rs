//! Cache Store Module
//!
//! Main cache engine combining the entry table with policy bookkeeping and
//! byte-accurate admission.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::cache::entry::{CacheEntry, CacheValue, Payload};
use crate::cache::policy::{EvictionMode, PolicyIndex};
use crate::cache::BYTES_PER_MB;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Bounded key-value store with policy-driven eviction.
///
/// The store keeps three structures in lockstep on every mutation: the entry
/// table, the mode-specific policy index, and the running byte total. The
/// total never exceeds the configured limit after a completed operation;
/// values that could never fit are rejected outright.
///
/// This is the single-threaded core. Wrap it in
/// [`SharedCache`](crate::SharedCache) when multiple callers share one
/// instance.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Identifier to entry mapping
    entries: HashMap<String, CacheEntry<V>>,
    /// Mode-specific victim-selection structure
    policy: PolicyIndex,
    /// Eviction mode, fixed at construction
    mode: EvictionMode,
    /// Sum of charged bytes across all entries
    total_bytes: usize,
    /// Memory limit in bytes
    limit_bytes: usize,
    /// Size at or above which values are stored serialized; None disables
    serialize_threshold: Option<usize>,
    /// Monotonic counter stamping policy events
    ticks: u64,
}

impl<V: CacheValue> CacheStore<V> {
    // == Constructors ==
    /// Creates a store from the megabyte-denominated public configuration.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        Self::with_limits(
            config.memory_limit as usize * BYTES_PER_MB,
            config.mode,
            config.serialize_limit as usize * BYTES_PER_MB,
        )
    }

    /// Creates a store with byte-denominated limits.
    ///
    /// `serialize_threshold_bytes` of zero disables serialization.
    pub fn with_limits(
        limit_bytes: usize,
        mode: EvictionMode,
        serialize_threshold_bytes: usize,
    ) -> Result<Self> {
        if limit_bytes == 0 {
            return Err(CacheError::InvalidLimit(
                "memory limit must be positive".to_string(),
            ));
        }

        info!(
            limit_bytes,
            mode = mode.as_str(),
            serialize_threshold_bytes,
            "cache store initialized"
        );

        Ok(Self {
            entries: HashMap::new(),
            policy: PolicyIndex::for_mode(mode),
            mode,
            total_bytes: 0,
            limit_bytes,
            serialize_threshold: (serialize_threshold_bytes > 0).then_some(serialize_threshold_bytes),
            ticks: 0,
        })
    }

    // == Put ==
    /// Inserts or replaces the entry under `id`, evicting until it fits.
    ///
    /// Replacing an existing entry is a write, not an access: the old entry
    /// is discarded and the new one admitted fresh. A value whose charge
    /// alone exceeds the memory limit is rejected before any state changes.
    pub fn put(&mut self, id: &str, value: V) -> Result<()> {
        let payload = Payload::encode(value, self.serialize_threshold)?;
        let charged = payload.charged_bytes();

        if charged > self.limit_bytes {
            return Err(CacheError::CapacityExceeded {
                needed: charged,
                limit: self.limit_bytes,
            });
        }
        if payload.is_serialized() {
            debug!(id, charged_bytes = charged, "storing value in serialized form");
        }

        // Replacement: the previous entry under this id is gone either way.
        self.detach(id);
        self.evict_until_fits(charged);

        let stamp = self.tick();
        self.attach(id.to_string(), CacheEntry::new(payload, stamp));
        Ok(())
    }

    // == Get ==
    /// Returns the value stored under `id`, decoding serialized payloads.
    ///
    /// A hit counts as an access: LRU re-stamps the entry, LFU increments
    /// its frequency, LRA leaves the order untouched. The stored form stays
    /// in the cache.
    pub fn get(&mut self, id: &str) -> Result<V> {
        let value = match self.entries.get(id) {
            Some(entry) => entry.payload.value()?,
            None => return Err(CacheError::NotFound(id.to_string())),
        };

        self.touch(id);
        Ok(value)
    }

    // == Update ==
    /// Replaces the value under an existing `id`, recomputing its charge.
    ///
    /// An update is an access, not a fresh insertion: LRU and LRA re-stamp
    /// the entry, LFU increments its frequency while keeping its tie-break
    /// stamp. The stored form is re-chosen against the serialize threshold,
    /// in either direction. Errors with `NotFound` when `id` is absent and
    /// leave the previous entry untouched on any failure.
    pub fn update(&mut self, id: &str, value: V) -> Result<()> {
        if !self.entries.contains_key(id) {
            return Err(CacheError::NotFound(id.to_string()));
        }

        let payload = Payload::encode(value, self.serialize_threshold)?;
        let charged = payload.charged_bytes();

        if charged > self.limit_bytes {
            return Err(CacheError::CapacityExceeded {
                needed: charged,
                limit: self.limit_bytes,
            });
        }

        let previous = match self.detach(id) {
            Some(entry) => entry,
            None => return Err(CacheError::NotFound(id.to_string())),
        };
        self.evict_until_fits(charged);

        let entry = match self.mode {
            EvictionMode::Lru | EvictionMode::Lra => {
                let stamp = self.tick();
                CacheEntry {
                    payload,
                    charged_bytes: charged,
                    stamp,
                    frequency: 1,
                }
            }
            EvictionMode::Lfu => CacheEntry {
                payload,
                charged_bytes: charged,
                stamp: previous.stamp,
                frequency: previous.frequency + 1,
            },
        };
        self.attach(id.to_string(), entry);
        Ok(())
    }

    // == Delete ==
    /// Removes the entry under `id`.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        match self.detach(id) {
            Some(_) => Ok(()),
            None => Err(CacheError::NotFound(id.to_string())),
        }
    }

    // == Contains ==
    /// Checks whether `id` is cached. Does not count as an access.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    // == Clear ==
    /// Removes all entries.
    ///
    /// The monotonic counter is preserved so stamps stay unique for the
    /// lifetime of the instance.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.policy.clear();
        self.total_bytes = 0;
    }

    // == Peek ==
    /// Returns the value under `id` without touching policy metadata.
    ///
    /// The sentinel-returning companion to [`get`](Self::get): misses and
    /// undecodable payloads both yield `None` here, while `get` surfaces
    /// them as errors.
    pub fn peek(&self, id: &str) -> Option<V> {
        self.entries
            .get(id)
            .and_then(|entry| entry.payload.value().ok())
    }

    // == Overview ==
    /// Returns a snapshot mapping each identifier to its charged bytes.
    pub fn overview(&self) -> HashMap<String, usize> {
        self.entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.charged_bytes))
            .collect()
    }

    // == Identifiers ==
    /// Returns a snapshot of all identifiers in bookkeeping-stamp order.
    ///
    /// Under LRA and LFU this is addition order; under LRU entries move to
    /// the back when read.
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<(&String, u64)> = self
            .entries
            .iter()
            .map(|(id, entry)| (id, entry.stamp))
            .collect();
        ids.sort_by_key(|(_, stamp)| *stamp);
        ids.into_iter().map(|(id, _)| id.clone()).collect()
    }

    // == Memory Accounting ==
    /// Returns the total charged bytes.
    pub fn memory_usage_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Returns the total charged bytes in megabytes.
    pub fn memory_usage_mb(&self) -> f64 {
        self.total_bytes as f64 / BYTES_PER_MB as f64
    }

    /// Returns the used fraction of the memory limit, in [0, 1].
    pub fn memory_usage_fraction(&self) -> f64 {
        self.total_bytes as f64 / self.limit_bytes as f64
    }

    // == Accessors ==
    /// Returns the memory limit in bytes.
    pub fn memory_limit_bytes(&self) -> usize {
        self.limit_bytes
    }

    /// Returns the eviction mode.
    pub fn mode(&self) -> EvictionMode {
        self.mode
    }

    /// Returns the serialize threshold in bytes, if serialization is enabled.
    pub fn serialize_threshold_bytes(&self) -> Option<usize> {
        self.serialize_threshold
    }

    /// Returns whether the entry under `id` is stored in serialized form.
    pub fn is_serialized(&self, id: &str) -> Option<bool> {
        self.entries.get(id).map(|entry| entry.payload.is_serialized())
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Internal Bookkeeping ==
    /// Advances and returns the monotonic counter.
    fn tick(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }

    /// Applies the mode's access bookkeeping after a hit on `id`.
    fn touch(&mut self, id: &str) {
        match self.mode {
            // Reads never reorder under LRA.
            EvictionMode::Lra => {}
            EvictionMode::Lru => {
                let stamp = self.tick();
                let Self { entries, policy, .. } = self;
                if let (Some(entry), PolicyIndex::Recency(index)) = (entries.get_mut(id), policy) {
                    index.remove(entry.stamp);
                    entry.stamp = stamp;
                    index.insert(stamp, id.to_string());
                }
            }
            EvictionMode::Lfu => {
                let Self { entries, policy, .. } = self;
                if let (Some(entry), PolicyIndex::Frequency(heap)) = (entries.get_mut(id), policy) {
                    entry.frequency += 1;
                    heap.push(entry.frequency, entry.stamp, id.to_string());
                }
            }
        }
    }

    /// Removes `id` from the table, the policy index, and the byte total.
    ///
    /// Frequency-heap records are left to go stale; victim selection
    /// discards them.
    fn detach(&mut self, id: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(id)?;
        self.total_bytes -= entry.charged_bytes;
        if let PolicyIndex::Recency(index) = &mut self.policy {
            index.remove(entry.stamp);
        }
        Some(entry)
    }

    /// Adds an entry to the table, the policy index, and the byte total.
    fn attach(&mut self, id: String, entry: CacheEntry<V>) {
        self.total_bytes += entry.charged_bytes;
        match &mut self.policy {
            PolicyIndex::Recency(index) => index.insert(entry.stamp, id.clone()),
            PolicyIndex::Frequency(heap) => heap.push(entry.frequency, entry.stamp, id.clone()),
        }
        self.entries.insert(id, entry);
    }

    /// Evicts single victims until `incoming` more bytes fit under the limit.
    fn evict_until_fits(&mut self, incoming: usize) {
        while self.total_bytes + incoming > self.limit_bytes {
            if self.evict_one().is_none() {
                break;
            }
        }
    }

    /// Selects and removes one victim per the mode. Returns its identifier.
    fn evict_one(&mut self) -> Option<String> {
        let victim = match &mut self.policy {
            PolicyIndex::Recency(index) => index.oldest().map(|(_, id)| id.to_string()),
            PolicyIndex::Frequency(heap) => {
                let entries = &self.entries;
                heap.pop_valid(|id| entries.get(id).map(|e| (e.frequency, e.stamp)))
            }
        }?;

        if let Some(entry) = self.detach(&victim) {
            debug!(
                id = %victim,
                freed_bytes = entry.charged_bytes,
                mode = self.mode.as_str(),
                "evicted entry"
            );
        }
        Some(victim)
    }

    // == Test Support ==
    /// Asserts the cross-structure invariants. Test builds only.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let summed: usize = self.entries.values().map(|e| e.charged_bytes).sum();
        assert_eq!(summed, self.total_bytes, "byte total out of sync");
        assert!(self.total_bytes <= self.limit_bytes, "limit exceeded");

        match &self.policy {
            PolicyIndex::Recency(index) => {
                assert_eq!(index.len(), self.entries.len(), "index size mismatch");
                for id in index.iter_ids() {
                    assert!(self.entries.contains_key(id), "index id missing from table");
                }
            }
            PolicyIndex::Frequency(heap) => {
                for (id, entry) in &self.entries {
                    assert!(
                        heap.has_record(entry.frequency, entry.stamp, id),
                        "no live heap record for {id}"
                    );
                }
            }
        }
    }

    /// Returns the monotonic counter. Test builds only.
    #[cfg(test)]
    pub(crate) fn ticks(&self) -> u64 {
        self.ticks
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ByteSized;

    fn store(limit_bytes: usize, mode: EvictionMode) -> CacheStore<String> {
        CacheStore::with_limits(limit_bytes, mode, 0).unwrap()
    }

    #[test]
    fn test_store_new_from_config() {
        let config = CacheConfig {
            memory_limit: 10,
            mode: EvictionMode::Lru,
            serialize_limit: 1,
        };
        let store: CacheStore<String> = CacheStore::new(&config).unwrap();

        assert_eq!(store.memory_limit_bytes(), 10 * BYTES_PER_MB);
        assert_eq!(store.serialize_threshold_bytes(), Some(BYTES_PER_MB));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_rejects_zero_limit() {
        let result: Result<CacheStore<String>> =
            CacheStore::with_limits(0, EvictionMode::Lru, 0);
        assert!(matches!(result, Err(CacheError::InvalidLimit(_))));
    }

    #[test]
    fn test_store_put_and_get() {
        let mut store = store(4096, EvictionMode::Lru);

        store.put("key1", "value1".to_string()).unwrap();
        assert_eq!(store.get("key1").unwrap(), "value1");
        assert_eq!(store.len(), 1);
        store.assert_consistent();
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = store(4096, EvictionMode::Lru);
        let result = store.get("nonexistent");
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_store_overwrite_charges_new_size() {
        let mut store = store(4096, EvictionMode::Lru);

        store.put("key1", "a".repeat(100)).unwrap();
        store.put("key1", "b".repeat(10)).unwrap();

        assert_eq!(store.get("key1").unwrap(), "b".repeat(10));
        assert_eq!(store.len(), 1);
        assert_eq!(store.memory_usage_bytes(), "b".repeat(10).byte_size());
        store.assert_consistent();
    }

    #[test]
    fn test_store_delete() {
        let mut store = store(4096, EvictionMode::Lru);

        store.put("key1", "value1".to_string()).unwrap();
        store.delete("key1").unwrap();

        assert!(store.is_empty());
        assert_eq!(store.memory_usage_bytes(), 0);
        assert!(matches!(store.get("key1"), Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_store_delete_nonexistent() {
        let mut store = store(4096, EvictionMode::Lru);
        assert!(matches!(
            store.delete("nonexistent"),
            Err(CacheError::NotFound(_))
        ));
    }

    #[test]
    fn test_store_contains_is_not_an_access() {
        let mut store = CacheStore::<Weighted>::with_limits(100, EvictionMode::Lru, 0).unwrap();
        store.put("a", Weighted::new(40)).unwrap();
        store.put("b", Weighted::new(40)).unwrap();

        // contains must not promote "a"; inserting "c" evicts it anyway.
        assert!(store.contains("a"));
        store.put("c", Weighted::new(40)).unwrap();

        assert!(!store.contains("a"));
        assert!(store.contains("b"));
        assert!(store.contains("c"));
        store.assert_consistent();
    }

    #[test]
    fn test_store_clear_preserves_counter() {
        let mut store = store(4096, EvictionMode::Lru);

        store.put("key1", "value1".to_string()).unwrap();
        store.put("key2", "value2".to_string()).unwrap();
        let ticks_before = store.ticks();

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.memory_usage_bytes(), 0);
        assert_eq!(store.ticks(), ticks_before);

        store.put("key3", "value3".to_string()).unwrap();
        assert!(store.ticks() > ticks_before);
        store.assert_consistent();
    }

    #[test]
    fn test_store_peek_does_not_reorder() {
        let mut store = CacheStore::<Weighted>::with_limits(100, EvictionMode::Lru, 0).unwrap();
        store.put("a", Weighted::new(40)).unwrap();
        store.put("b", Weighted::new(40)).unwrap();

        assert!(store.peek("a").is_some());
        assert!(store.peek("missing").is_none());

        store.put("c", Weighted::new(40)).unwrap();
        assert!(!store.contains("a"), "peek must not promote");
    }

    #[test]
    fn test_store_overview_reports_charged_bytes() {
        let mut store = store(4096, EvictionMode::Lru);
        store.put("key1", "abc".to_string()).unwrap();

        let overview = store.overview();
        assert_eq!(overview.len(), 1);
        assert_eq!(overview["key1"], "abc".to_string().byte_size());
    }

    #[test]
    fn test_store_identifiers_in_addition_order() {
        let mut store = store(4096, EvictionMode::Lra);
        store.put("key1", "v".to_string()).unwrap();
        store.put("key2", "v".to_string()).unwrap();
        store.put("key3", "v".to_string()).unwrap();

        assert_eq!(store.identifiers(), vec!["key1", "key2", "key3"]);
    }

    #[test]
    fn test_store_memory_accounting_accessors() {
        let mut store = CacheStore::<Weighted>::with_limits(200, EvictionMode::Lru, 0).unwrap();
        store.put("a", Weighted::new(50)).unwrap();

        assert_eq!(store.memory_usage_bytes(), 50);
        assert_eq!(store.memory_usage_fraction(), 0.25);
        assert_eq!(store.memory_usage_mb(), 50.0 / BYTES_PER_MB as f64);
    }

    #[test]
    fn test_store_capacity_rejection_leaves_state_unchanged() {
        let mut store = CacheStore::<Weighted>::with_limits(100, EvictionMode::Lru, 0).unwrap();
        store.put("a", Weighted::new(40)).unwrap();

        let result = store.put("huge", Weighted::new(10_000));
        assert!(matches!(result, Err(CacheError::CapacityExceeded { .. })));

        // The resident entry survived and accounting did not move.
        assert!(store.contains("a"));
        assert_eq!(store.memory_usage_bytes(), 40);
        store.assert_consistent();
    }

    #[test]
    fn test_store_capacity_rejection_on_replacement_keeps_old_entry() {
        let mut store = CacheStore::<Weighted>::with_limits(100, EvictionMode::Lru, 0).unwrap();
        store.put("a", Weighted::new(40)).unwrap();

        let result = store.put("a", Weighted::new(10_000));
        assert!(matches!(result, Err(CacheError::CapacityExceeded { .. })));

        assert_eq!(store.peek("a").unwrap().weight, 40);
        store.assert_consistent();
    }

    #[test]
    fn test_store_update_absent_errors() {
        let mut store = store(4096, EvictionMode::Lru);
        let result = store.update("missing", "value".to_string());
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_store_update_recomputes_charge() {
        let mut store = store(4096, EvictionMode::Lru);
        store.put("key1", "short".to_string()).unwrap();
        let before = store.memory_usage_bytes();

        store.update("key1", "a much longer value".to_string()).unwrap();
        assert!(store.memory_usage_bytes() > before);
        assert_eq!(store.get("key1").unwrap(), "a much longer value");
        store.assert_consistent();
    }

    #[test]
    fn test_store_update_crosses_serialize_threshold_both_ways() {
        let mut store: CacheStore<String> =
            CacheStore::with_limits(4096, EvictionMode::Lru, 64).unwrap();

        store.put("key1", "tiny".to_string()).unwrap();
        assert_eq!(store.is_serialized("key1"), Some(false));

        store.update("key1", "x".repeat(100)).unwrap();
        assert_eq!(store.is_serialized("key1"), Some(true));
        assert_eq!(store.get("key1").unwrap(), "x".repeat(100));

        store.update("key1", "tiny again".to_string()).unwrap();
        assert_eq!(store.is_serialized("key1"), Some(false));
        store.assert_consistent();
    }

    #[test]
    fn test_store_lru_eviction_order() {
        let mut store = CacheStore::<Weighted>::with_limits(100, EvictionMode::Lru, 0).unwrap();
        store.put("a", Weighted::new(40)).unwrap();
        store.put("b", Weighted::new(40)).unwrap();

        // Reading "a" promotes it; "b" becomes the victim.
        store.get("a").unwrap();
        store.put("c", Weighted::new(40)).unwrap();

        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert!(store.contains("c"));
        store.assert_consistent();
    }

    #[test]
    fn test_store_lra_reads_do_not_promote() {
        let mut store = CacheStore::<Weighted>::with_limits(100, EvictionMode::Lra, 0).unwrap();
        store.put("a", Weighted::new(40)).unwrap();
        store.put("b", Weighted::new(40)).unwrap();

        store.get("a").unwrap();
        store.put("c", Weighted::new(40)).unwrap();

        assert!(!store.contains("a"), "reads must not reorder under LRA");
        assert!(store.contains("b"));
        assert!(store.contains("c"));
        store.assert_consistent();
    }

    #[test]
    fn test_store_lra_update_is_a_write_event() {
        let mut store = CacheStore::<Weighted>::with_limits(100, EvictionMode::Lra, 0).unwrap();
        store.put("a", Weighted::new(40)).unwrap();
        store.put("b", Weighted::new(40)).unwrap();

        store.update("a", Weighted::new(40)).unwrap();
        store.put("c", Weighted::new(40)).unwrap();

        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        store.assert_consistent();
    }

    #[test]
    fn test_store_lfu_victim_is_least_frequent() {
        let mut store = CacheStore::<Weighted>::with_limits(120, EvictionMode::Lfu, 0).unwrap();
        store.put("a", Weighted::new(40)).unwrap();
        store.put("b", Weighted::new(40)).unwrap();
        store.put("c", Weighted::new(40)).unwrap();

        store.get("a").unwrap();
        store.get("b").unwrap();

        store.put("d", Weighted::new(40)).unwrap();
        assert!(!store.contains("c"), "lowest frequency is the victim");
        store.assert_consistent();
    }

    #[test]
    fn test_store_lfu_replacement_resets_frequency() {
        let mut store = CacheStore::<Weighted>::with_limits(120, EvictionMode::Lfu, 0).unwrap();
        store.put("a", Weighted::new(40)).unwrap();
        store.get("a").unwrap();
        store.get("a").unwrap();

        // Replacement through put starts the count over at 1.
        store.put("a", Weighted::new(40)).unwrap();
        store.put("b", Weighted::new(40)).unwrap();
        store.put("c", Weighted::new(40)).unwrap();
        store.get("b").unwrap();
        store.get("c").unwrap();

        store.put("d", Weighted::new(40)).unwrap();
        assert!(!store.contains("a"), "replaced entry is back to frequency 1");
        store.assert_consistent();
    }

    #[test]
    fn test_store_monotonic_counter_never_repeats() {
        let mut store = store(4096, EvictionMode::Lru);
        let mut last = store.ticks();

        for i in 0..10 {
            store.put(&format!("key{i}"), "v".to_string()).unwrap();
            assert!(store.ticks() > last);
            last = store.ticks();
        }
    }

    // Byte-exact test value: reports whatever weight it is given.
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    pub(crate) struct Weighted {
        pub(crate) weight: usize,
    }

    impl Weighted {
        pub(crate) fn new(weight: usize) -> Self {
            Self { weight }
        }
    }

    impl ByteSized for Weighted {
        fn byte_size(&self) -> usize {
            self.weight
        }
    }
}
