//! Memoization of loaded tables and analysis results.
//!
//! Each key owns a slot guarded by its own mutex. A compute holds the slot
//! lock for its whole duration, so concurrent requests for the same key wait
//! for it and then reuse the value, while other keys proceed independently.
//! A failed compute leaves the slot empty.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identity of an input dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(PathBuf);

impl SourceId {
    /// Identifies a file, canonicalizing the path when it exists.
    pub fn from_path(path: &Path) -> Self {
        Self(std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
    }

    /// The path the dataset is read from.
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Cache key for an analysis: which dataset, under which technology's rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: SourceId,
    pub technology: String,
}

impl CacheKey {
    pub fn new(source: SourceId, technology: impl Into<String>) -> Self {
        Self {
            source,
            technology: technology.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.source, self.technology)
    }
}

type Slot<V> = Arc<Mutex<Option<Arc<V>>>>;

/// Unbounded map from key to shared value with single-flight population.
pub struct KeyedCache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for KeyedCache<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K: Eq + Hash + Clone, V> KeyedCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &K) -> Slot<V> {
        let mut slots = lock(&self.slots);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Returns the cached value or computes, stores and returns a new one.
    ///
    /// Errors from `compute` are returned as-is and nothing is stored.
    pub fn get_or_try_insert_with<E, F>(&self, key: &K, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot(key);
        let mut guard = lock(&*slot);

        if let Some(ref value) = *guard {
            return Ok(Arc::clone(value));
        }

        let value = Arc::new(compute()?);
        *guard = Some(Arc::clone(&value));
        Ok(value)
    }

    /// Drops the value for `key`. Returns true if one was cached.
    pub fn invalidate(&self, key: &K) -> bool {
        // Clear in place rather than removing the slot so that a compute
        // already in flight keeps excluding new ones for the same key.
        let slot = lock(&self.slots).get(key).cloned();
        match slot {
            Some(slot) => lock(&*slot).take().is_some(),
            None => false,
        }
    }

    /// Number of keys currently holding a value.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot<V>> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|slot| lock(&***slot).is_some()).count()
    }
}
