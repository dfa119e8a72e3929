//! Bounded memory of recently processed job keys.

use std::collections::HashSet;

/// Default maximum number of remembered `channel/message-id` keys.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Bounded set of composite job keys already processed.
///
/// When full, an arbitrary entry is evicted to admit the new one. This is
/// not an LRU: eviction order is unspecified and callers must not depend
/// on it.
#[derive(Debug)]
pub struct DedupLedger {
    keys: HashSet<String>,
    capacity: usize,
}

impl DedupLedger {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            keys: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record `key` as processed. Returns `false` if it was already present.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        let fresh = self.keys.insert(key.into());
        if self.keys.len() > self.capacity {
            // Arbitrary eviction: whatever iteration order yields first.
            if let Some(victim) = self.keys.iter().next().cloned() {
                self.keys.remove(&victim);
            }
        }
        fresh
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for DedupLedger {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
