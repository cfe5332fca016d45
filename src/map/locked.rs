//! Global-lock baseline: `parking_lot::RwLock<HashMap>`.
//!
//! Serializes every write; useful as the "does not scale" reference line.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{ConcurrentMap, MapAdapter, QuiescentContext};

/// `HashMap` behind a single reader-writer lock.
#[derive(Debug, Default)]
pub struct LockedMap {
    inner: RwLock<HashMap<u32, u32>>,
}

impl LockedMap {
    /// Empty map with room for `capacity` keys.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Number of keys currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True if no key is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl ConcurrentMap for LockedMap {
    #[inline]
    fn assign(&self, key: u32, value: u32) {
        self.inner.write().insert(key, value);
    }

    #[inline]
    fn get(&self, key: u32) -> Option<u32> {
        self.inner.read().get(&key).copied()
    }

    #[inline]
    fn erase(&self, key: u32) {
        self.inner.write().remove(&key);
    }
}

/// Builds [`LockedMap`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockedAdapter;

impl MapAdapter for LockedAdapter {
    type Map = LockedMap;
    type Context = QuiescentContext;

    fn name(&self) -> &'static str {
        "locked"
    }

    fn create_map(&self, capacity: usize) -> Self::Map {
        LockedMap::with_capacity(capacity)
    }

    fn thread_context(&self, _index: usize) -> Self::Context {
        QuiescentContext::default()
    }
}
