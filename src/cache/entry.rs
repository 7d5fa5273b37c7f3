//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::sync::Arc;

use crate::clock::Timestamp;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// The value is held behind an `Arc` so lookups can hand out handles that
/// outlive the entry itself.
#[derive(Debug)]
pub struct Entry<V> {
    /// The stored value
    value: Arc<V>,
    /// When the entry was stored (or last replaced)
    pub inserted_at: Timestamp,
    /// Last access that kept the entry alive; never earlier than `inserted_at`
    pub last_accessed_at: Timestamp,
    /// Expiration time; `None` when the policy has no time dimension
    pub expires_at: Option<Timestamp>,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates a new entry stored at `now` with no expiration set.
    pub fn new(value: Arc<V>, now: Timestamp) -> Self {
        Self {
            value,
            inserted_at: now,
            last_accessed_at: now,
            expires_at: None,
        }
    }

    // == Value ==
    /// Borrows the stored value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns a new shared handle to the stored value.
    pub fn handle(&self) -> Arc<V> {
        Arc::clone(&self.value)
    }

    // == Touch ==
    /// Records a refreshing access at `now`.
    pub fn touch(&mut self, now: Timestamp) {
        if now > self.last_accessed_at {
            self.last_accessed_at = now;
        }
    }

    // == Is Expired ==
    /// Checks the entry-level expiration field.
    ///
    /// An entry is expired once `now >= expires_at`, so a zero TTL expires
    /// at the instant of insertion.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }
}
