//! Memoization Module
//!
//! Adapters that route a function's results through the cache core. Each
//! adapter holds a cache handle, the wrapped function, and what identifies
//! it, and touches only the `contains`/`get`/`put`/`update` surface.
//!
//! Three keying shapes are provided:
//! - [`TagMemo`]: a fixed identifier supplied at construction; the entry is
//!   also reachable through the cache directly.
//! - [`ArgMemo`]: the identifier is derived from the function's name and a
//!   canonical fingerprint of its arguments; callers must not rely on it.
//! - [`DepMemo`]: the identifier is derived from the function's name and a
//!   client-supplied key function over the arguments.
//!
//! Every adapter accepts an `update_cache` flag at call time. The flag never
//! reaches the wrapped function or the fingerprint; when set, the adapter
//! recomputes and writes the fresh result back through the core.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::cache::CacheValue;
use crate::error::{CacheError, Result};
use crate::shared::SharedCache;

// == Resolution ==
/// Shared get-or-compute-then-store cycle.
///
/// On a forced refresh, or a miss, the wrapped function runs and its result
/// is written back: `update` when the entry exists, `put` when it does not.
fn resolve<V, F>(
    cache: &SharedCache<V>,
    identifier: &str,
    update_cache: bool,
    compute: F,
) -> Result<V>
where
    V: CacheValue,
    F: FnOnce() -> V,
{
    if !update_cache && cache.contains(identifier) {
        match cache.get(identifier) {
            Ok(value) => return Ok(value),
            // Evicted between the two calls; fall through and recompute.
            Err(CacheError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }
    }

    let result = compute();
    if cache.contains(identifier) {
        cache.update(identifier, result.clone())?;
    } else {
        cache.put(identifier, result.clone())?;
    }
    Ok(result)
}

// == Tag Memo ==
/// Memoizes a function under a fixed identifier.
///
/// The first call computes and stores; later calls return the cached value
/// regardless of arguments. Because the identifier is known to the caller,
/// the entry can also be read or overwritten through the cache directly.
pub struct TagMemo<V, F> {
    cache: SharedCache<V>,
    identifier: String,
    func: F,
}

impl<V: CacheValue, F> TagMemo<V, F> {
    /// Wraps `func`, caching its result under `identifier`.
    pub fn new(cache: &SharedCache<V>, identifier: impl Into<String>, func: F) -> Self {
        Self {
            cache: cache.clone(),
            identifier: identifier.into(),
            func,
        }
    }

    /// Returns the cached result, computing it on the first call.
    pub fn call<A>(&self, args: &A) -> Result<V>
    where
        F: Fn(&A) -> V,
    {
        self.call_with(args, false)
    }

    /// Like [`call`](Self::call); when `update_cache` is set, bypasses any
    /// hit and stores the recomputed result.
    pub fn call_with<A>(&self, args: &A, update_cache: bool) -> Result<V>
    where
        F: Fn(&A) -> V,
    {
        resolve(&self.cache, &self.identifier, update_cache, || {
            (self.func)(args)
        })
    }

    /// Returns the identifier the results are stored under.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

// == Arg Memo ==
/// Memoizes a function keyed by its name and its arguments.
///
/// The identifier combines the stable `name` given at construction with a
/// fingerprint of the argument bundle's structural contents, so equal
/// argument bundles share one entry. The derived identifier is an internal
/// detail; callers must not rely on reading it back from the cache.
pub struct ArgMemo<V, F> {
    cache: SharedCache<V>,
    name: String,
    func: F,
}

impl<V: CacheValue, F> ArgMemo<V, F> {
    /// Wraps `func`, caching one result per distinct argument bundle.
    ///
    /// `name` stands in for the function's identity and must be unique among
    /// the adapters sharing a cache.
    pub fn new(cache: &SharedCache<V>, name: impl Into<String>, func: F) -> Self {
        Self {
            cache: cache.clone(),
            name: name.into(),
            func,
        }
    }

    /// Returns the result cached for `args`, computing it on first sight.
    pub fn call<A>(&self, args: &A) -> Result<V>
    where
        A: Serialize,
        F: Fn(&A) -> V,
    {
        self.call_with(args, false)
    }

    /// Like [`call`](Self::call); when `update_cache` is set, bypasses any
    /// hit and stores the recomputed result.
    pub fn call_with<A>(&self, args: &A, update_cache: bool) -> Result<V>
    where
        A: Serialize,
        F: Fn(&A) -> V,
    {
        let identifier = self.identifier_for(args)?;
        resolve(&self.cache, &identifier, update_cache, || (self.func)(args))
    }

    /// Derives the identifier for an argument bundle.
    ///
    /// The bundle's canonical encoding is hashed, so the identifier is
    /// deterministic for equal bundles and independent of the flag.
    fn identifier_for<A: Serialize>(&self, args: &A) -> Result<String> {
        let encoded = bincode::serialize(args)?;
        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        Ok(format!("{}({})", self.name, hex::encode(hasher.finalize())))
    }
}

// == Dep Memo ==
/// Memoizes a function keyed by a dependency derived from its arguments.
///
/// A client-supplied key function maps the arguments to the value the result
/// actually depends on; calls agreeing on that dependency share one entry.
pub struct DepMemo<V, F, K> {
    cache: SharedCache<V>,
    name: String,
    func: F,
    key_fn: K,
}

impl<V: CacheValue, F, K> DepMemo<V, F, K> {
    /// Wraps `func`, caching one result per distinct dependency value.
    pub fn new(
        cache: &SharedCache<V>,
        name: impl Into<String>,
        key_fn: K,
        func: F,
    ) -> Self {
        Self {
            cache: cache.clone(),
            name: name.into(),
            func,
            key_fn,
        }
    }

    /// Returns the result cached for the dependency of `args`.
    pub fn call<A>(&self, args: &A) -> Result<V>
    where
        F: Fn(&A) -> V,
        K: Fn(&A) -> String,
    {
        self.call_with(args, false)
    }

    /// Like [`call`](Self::call); when `update_cache` is set, bypasses any
    /// hit and stores the recomputed result.
    pub fn call_with<A>(&self, args: &A, update_cache: bool) -> Result<V>
    where
        F: Fn(&A) -> V,
        K: Fn(&A) -> String,
    {
        let identifier = format!("{}:{}", self.name, (self.key_fn)(args));
        resolve(&self.cache, &identifier, update_cache, || (self.func)(args))
    }
}
