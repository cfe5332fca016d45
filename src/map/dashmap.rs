//! `DashMap` adapter (sharded `RwLock`s, no deferred reclamation).

use dashmap::DashMap;

use super::{ConcurrentMap, MapAdapter, QuiescentContext};

impl ConcurrentMap for DashMap<u32, u32> {
    #[inline]
    fn assign(&self, key: u32, value: u32) {
        self.insert(key, value);
    }

    #[inline]
    fn get(&self, key: u32) -> Option<u32> {
        Self::get(self, &key).map(|entry| *entry.value())
    }

    #[inline]
    fn erase(&self, key: u32) {
        self.remove(&key);
    }
}

/// Builds [`DashMap`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashMapAdapter;

impl MapAdapter for DashMapAdapter {
    type Map = DashMap<u32, u32>;
    type Context = QuiescentContext;

    fn name(&self) -> &'static str {
        "dashmap"
    }

    fn create_map(&self, capacity: usize) -> Self::Map {
        DashMap::with_capacity(capacity)
    }

    fn thread_context(&self, _index: usize) -> Self::Context {
        QuiescentContext::default()
    }
}
