//! Entry Store Module
//!
//! The key to entry map owned by a cache. Ordering structures (recency list,
//! expiry index) live with the eviction policy that needs them.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::cache::Entry;
use crate::clock::Timestamp;

// == Entry Store ==
/// Key-value storage for a single cache.
#[derive(Debug)]
pub struct EntryStore<K, V> {
    entries: HashMap<K, Entry<V>>,
}

impl<K, V> Default for EntryStore<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq, V> EntryStore<K, V> {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Stores a fresh entry for `key`, returning the entry it replaced.
    pub fn insert(&mut self, key: K, value: Arc<V>, now: Timestamp) -> Option<Entry<V>> {
        self.entries.insert(key, Entry::new(value, now))
    }

    // == Lookup ==
    pub fn get(&self, key: &K) -> Option<&Entry<V>> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut Entry<V>> {
        self.entries.get_mut(key)
    }

    // == Remove ==
    /// Removes an entry by key.
    pub fn remove(&mut self, key: &K) -> Option<Entry<V>> {
        self.entries.remove(key)
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // == Iteration ==
    /// Iterates over all stored keys, live or not.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Iterates over all stored entries, live or not.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Entry<V>)> {
        self.entries.iter()
    }

    // == Length ==
    /// Returns the number of stored entries, including expired ones that
    /// have not been reclaimed yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
