//! In-memory download counters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Per-identifier download counts.
///
/// Counts live only for the lifetime of the process; they start at zero again
/// after a restart. Increments for one identifier are atomic, and identifiers
/// are counted independently of each other.
#[derive(Debug, Default)]
pub struct DownloadCounter {
    counts: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl DownloadCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one download of `id` and return the new count.
    pub fn increment(&self, id: &str) -> u64 {
        self.slot(id).fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Current count for `id` (zero if never downloaded).
    pub fn get(&self, id: &str) -> u64 {
        let counts = self.counts.read().unwrap_or_else(PoisonError::into_inner);
        counts
            .get(id)
            .map(|c| c.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Forget the count for `id`, e.g. once its object has been deleted.
    pub fn remove(&self, id: &str) {
        let mut counts = self.counts.write().unwrap_or_else(PoisonError::into_inner);
        counts.remove(id);
    }

    /// Number of identifiers with a counter.
    pub fn len(&self) -> usize {
        self.counts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no identifier has been counted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get or lazily create the counter slot for `id`.
    fn slot(&self, id: &str) -> Arc<AtomicU64> {
        {
            let counts = self.counts.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = counts.get(id) {
                return slot.clone();
            }
        }

        let mut counts = self.counts.write().unwrap_or_else(PoisonError::into_inner);
        counts
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone()
    }
}
