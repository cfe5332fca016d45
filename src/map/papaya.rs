//! `papaya::HashMap` adapter (lock-free, seize reclamation).

use papaya::HashMap;
use seize::Guard;

use super::{ConcurrentMap, MapAdapter, ThreadContext};

impl ConcurrentMap for HashMap<u32, u32> {
    #[inline]
    fn assign(&self, key: u32, value: u32) {
        let guard = self.guard();
        self.insert(key, value, &guard);
    }

    #[inline]
    fn get(&self, key: u32) -> Option<u32> {
        let guard = self.guard();
        Self::get(self, &key, &guard).copied()
    }

    #[inline]
    fn erase(&self, key: u32) {
        let guard = self.guard();
        self.remove(&key, &guard);
    }
}

/// Seize context for papaya maps.
///
/// Seize tracks threads itself, so registration is bookkeeping only; the
/// per-chunk tick enters the map's collector and flushes the local batch of
/// retired entries.
#[derive(Debug, Default)]
pub struct SeizeContext {
    registered: bool,
    flushes: u64,
}

impl SeizeContext {
    /// Number of flushes performed.
    #[must_use]
    pub const fn flushes(&self) -> u64 {
        self.flushes
    }
}

impl ThreadContext<HashMap<u32, u32>> for SeizeContext {
    fn register(&mut self) {
        debug_assert!(!self.registered, "thread registered twice");
        self.registered = true;
    }

    fn unregister(&mut self) {
        self.registered = false;
    }

    fn update(&mut self, map: &HashMap<u32, u32>) {
        if self.registered {
            map.guard().flush();
            self.flushes += 1;
        }
    }
}

/// Builds papaya [`HashMap`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PapayaAdapter;

impl MapAdapter for PapayaAdapter {
    type Map = HashMap<u32, u32>;
    type Context = SeizeContext;

    fn name(&self) -> &'static str {
        "papaya"
    }

    fn create_map(&self, capacity: usize) -> Self::Map {
        HashMap::with_capacity(capacity)
    }

    fn thread_context(&self, _index: usize) -> Self::Context {
        SeizeContext::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_flushes_only_when_registered() {
        let map = PapayaAdapter.create_map(16);
        let mut ctx = PapayaAdapter.thread_context(0);

        ctx.update(&map);
        assert_eq!(ctx.flushes(), 0);

        ctx.register();
        map.assign(5, 5);
        map.erase(5);
        ctx.update(&map);
        assert_eq!(ctx.flushes(), 1);
    }
}
