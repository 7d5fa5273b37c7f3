//! Expiry Index Module
//!
//! Orders keys by expiration time so sweeps only visit entries that are
//! actually due.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::clock::Timestamp;

/// Position of a key in the index. The sequence number keeps keys with the
/// same deadline distinct.
type Slot = (Timestamp, u64);

// == Expiry Index ==
/// Min-ordered index of `expires_at -> key`.
#[derive(Debug)]
pub struct ExpiryIndex<K> {
    by_deadline: BTreeMap<Slot, K>,
    by_key: HashMap<K, Slot>,
    next_seq: u64,
}

impl<K> Default for ExpiryIndex<K> {
    fn default() -> Self {
        Self {
            by_deadline: BTreeMap::new(),
            by_key: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<K: Clone + Hash + Eq> ExpiryIndex<K> {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Schedule ==
    /// Sets (or moves) the deadline for `key`.
    pub fn schedule(&mut self, key: &K, expires_at: Timestamp) {
        if let Some(old) = self.by_key.remove(key) {
            self.by_deadline.remove(&old);
        }
        let slot = (expires_at, self.next_seq);
        self.next_seq = self.next_seq.wrapping_add(1);
        self.by_deadline.insert(slot, key.clone());
        self.by_key.insert(key.clone(), slot);
    }

    // == Cancel ==
    /// Forgets `key`. Returns whether it was scheduled.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.by_key.remove(key) {
            Some(slot) => {
                self.by_deadline.remove(&slot);
                true
            }
            None => false,
        }
    }

    // == Due ==
    /// Returns every key whose deadline is at or before `now`, earliest
    /// first. The index itself is left untouched.
    pub fn due(&self, now: Timestamp) -> Vec<K> {
        self.by_deadline
            .range(..=(now, u64::MAX))
            .map(|(_, key)| key.clone())
            .collect()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.by_deadline.clear();
        self.by_key.clear();
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
