//! `crossbeam_skiplist::SkipMap` adapter with epoch-based reclamation.

use crossbeam_skiplist::SkipMap;

use super::{ConcurrentMap, MapAdapter, ThreadContext};

impl ConcurrentMap for SkipMap<u32, u32> {
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

/// Reclamation bookkeeping for [`SkipMap`]s built with `SkipMap::new`.
///
/// Those maps pin through the calling thread's handle on the default epoch
/// collector, so deferred node frees pile up in that handle's local bag.
/// `update` pins the same handle and flushes it, pushing the bag to the
/// global queue and letting the epoch advance.
#[derive(Debug, Default)]
pub struct EpochContext {
    registered: bool,
    flushes: u64,
}

impl EpochContext {
    /// Whether this thread is registered with the sweep.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    /// Flushes performed so far.
    #[must_use]
    pub const fn flushes(&self) -> u64 {
        self.flushes
    }
}

impl<M: ?Sized> ThreadContext<M> for EpochContext {
    fn register(&mut self) {
        debug_assert!(!self.registered, "thread registered twice");
        self.registered = true;
    }

    fn unregister(&mut self) {
        self.registered = false;
    }

    fn update(&mut self, _map: &M) {
        if self.registered {
            crossbeam_epoch::pin().flush();
            self.flushes += 1;
        }
    }
}

/// Builds [`SkipMap`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipMapAdapter;

impl MapAdapter for SkipMapAdapter {
    type Map = SkipMap<u32, u32>;
    type Context = EpochContext;

    fn name(&self) -> &'static str {
        "skipmap"
    }

    // Skip lists do not preallocate.
    fn initial_capacity(&self, population: usize) -> usize {
        population
    }

    fn create_map(&self, _capacity: usize) -> Self::Map {
        SkipMap::new()
    }

    fn thread_context(&self, _index: usize) -> Self::Context {
        EpochContext::default()
    }
}
