//! Contracts for the map under test and its adapters.
//!
//! The harness only needs three operations from a map ([`ConcurrentMap`])
//! and three hooks from its reclamation scheme ([`ThreadContext`]). A
//! [`MapAdapter`] ties the two together and knows how to build them.
//!
//! Keys and values are `u32`; the value stored for a key is the key itself.
//!
//! ## Shipped adapters
//!
//! | Adapter | Map | Reclamation |
//! |---------|-----|-------------|
//! | [`DashMapAdapter`] | `dashmap::DashMap` (sharded locks) | none |
//! | [`SkipMapAdapter`] | `crossbeam_skiplist::SkipMap` | crossbeam epoch |
//! | [`PapayaAdapter`] | `papaya::HashMap` (lock-free) | seize |
//! | [`LockedAdapter`] | `parking_lot::RwLock<HashMap>` | none |

mod dashmap;
mod locked;
mod papaya;
mod skipmap;

use std::fmt as StdFmt;
use std::str::FromStr;

pub use self::dashmap::DashMapAdapter;
pub use self::locked::{LockedAdapter, LockedMap};
pub use self::papaya::{PapayaAdapter, SeizeContext};
pub use self::skipmap::{EpochContext, SkipMapAdapter};

// ============================================================================
//  Contracts
// ============================================================================

/// A thread-safe associative map driven by the harness.
///
/// Duplicate inserts and removes of absent keys are expected and must be
/// harmless.
pub trait ConcurrentMap: Send + Sync {
    /// Insert or overwrite `key`.
    fn assign(&self, key: u32, value: u32);

    /// Look up `key`.
    fn get(&self, key: u32) -> Option<u32>;

    /// Remove `key` if present.
    fn erase(&self, key: u32);
}

/// Per-thread reclamation bookkeeping.
///
/// `register` runs on the worker thread when the worker joins the sweep,
/// `update` once per chunk after the measured loop, `unregister` at the end
/// of the sweep.
pub trait ThreadContext<M: ?Sized> {
    /// Announce this thread to the reclamation scheme.
    fn register(&mut self);

    /// Withdraw this thread from the reclamation scheme.
    fn unregister(&mut self);

    /// Periodic reclamation tick.
    fn update(&mut self, map: &M);
}

/// Builds maps and per-thread contexts of one implementation.
pub trait MapAdapter: Send + Sync + 'static {
    /// Map type under test.
    type Map: ConcurrentMap + 'static;

    /// Per-thread context for [`Self::Map`].
    type Context: ThreadContext<Self::Map> + 'static;

    /// Name echoed in reports.
    fn name(&self) -> &'static str;

    /// Capacity to request for a map that will hold `population` keys.
    fn initial_capacity(&self, population: usize) -> usize {
        population.next_power_of_two()
    }

    /// Create an empty map.
    fn create_map(&self, capacity: usize) -> Self::Map;

    /// Create the context for worker slot `index`.
    ///
    /// Called on the worker's own thread.
    fn thread_context(&self, index: usize) -> Self::Context;
}

// ============================================================================
//  QuiescentContext
// ============================================================================

/// Context for maps without deferred reclamation.
///
/// Only tracks registration so misuse shows up in debug builds.
#[derive(Debug, Default)]
pub struct QuiescentContext {
    registered: bool,
    updates: u64,
}

impl QuiescentContext {
    /// Whether `register` has been called without a matching `unregister`.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    /// Number of `update` ticks received.
    #[must_use]
    pub const fn updates(&self) -> u64 {
        self.updates
    }
}

impl<M: ?Sized> ThreadContext<M> for QuiescentContext {
    fn register(&mut self) {
        debug_assert!(!self.registered, "thread registered twice");
        self.registered = true;
    }

    fn unregister(&mut self) {
        self.registered = false;
    }

    fn update(&mut self, _map: &M) {
        debug_assert!(self.registered, "update on unregistered thread");
        self.updates += 1;
    }
}

// ============================================================================
//  MapKind
// ============================================================================

/// Selector for the shipped adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MapKind {
    /// [`DashMapAdapter`].
    #[default]
    DashMap,
    /// [`SkipMapAdapter`].
    SkipMap,
    /// [`PapayaAdapter`].
    Papaya,
    /// [`LockedAdapter`].
    Locked,
}

impl MapKind {
    /// Every shipped adapter.
    pub const ALL: [Self; 4] = [Self::DashMap, Self::SkipMap, Self::Papaya, Self::Locked];

    /// Command-line and report name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DashMap => "dashmap",
            Self::SkipMap => "skipmap",
            Self::Papaya => "papaya",
            Self::Locked => "locked",
        }
    }
}

impl MapKind {
    /// Call `visitor` with the adapter this kind selects.
    pub fn visit<V: AdapterVisitor>(self, visitor: V) -> V::Output {
        match self {
            Self::DashMap => visitor.visit(DashMapAdapter),
            Self::SkipMap => visitor.visit(SkipMapAdapter),
            Self::Papaya => visitor.visit(PapayaAdapter),
            Self::Locked => visitor.visit(LockedAdapter),
        }
    }
}

/// Generic operation over whichever adapter a [`MapKind`] names.
///
/// Bridges a runtime map choice to code that is generic over
/// [`MapAdapter`] and therefore monomorphized per map.
pub trait AdapterVisitor {
    /// Result of the visit.
    type Output;

    /// Run with the concrete adapter.
    fn visit<A: MapAdapter + Clone>(self, adapter: A) -> Self::Output;
}

impl StdFmt::Display for MapKind {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown map '{s}', expected one of: {}", names.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise<A: MapAdapter>(adapter: &A) {
        let map = adapter.create_map(adapter.initial_capacity(100));
        let mut ctx = adapter.thread_context(0);
        ctx.register();

        assert_eq!(map.get(7), None);
        map.assign(7, 7);
        map.assign(7, 7);
        assert_eq!(map.get(7), Some(7));
        map.erase(7);
        map.erase(7);
        assert_eq!(map.get(7), None);

        for key in 2..200 {
            map.assign(key, key);
        }
        for key in 2..200 {
            assert_eq!(map.get(key), Some(key), "{} lost key {key}", adapter.name());
        }

        ctx.update(&map);
        ctx.unregister();
    }

    #[test]
    fn every_adapter_honors_the_contract() {
        exercise(&DashMapAdapter);
        exercise(&SkipMapAdapter);
        exercise(&PapayaAdapter);
        exercise(&LockedAdapter);
    }

    #[test]
    fn adapter_names_match_kinds() {
        assert_eq!(DashMapAdapter.name(), MapKind::DashMap.as_str());
        assert_eq!(SkipMapAdapter.name(), MapKind::SkipMap.as_str());
        assert_eq!(PapayaAdapter.name(), MapKind::Papaya.as_str());
        assert_eq!(LockedAdapter.name(), MapKind::Locked.as_str());
    }

    #[test]
    fn map_kind_parses_case_insensitively() {
        assert_eq!("DashMap".parse::<MapKind>(), Ok(MapKind::DashMap));
        assert_eq!("papaya".parse::<MapKind>(), Ok(MapKind::Papaya));
        let err = "btree".parse::<MapKind>().unwrap_err();
        assert!(err.contains("skipmap"));
    }

    #[test]
    fn visit_reaches_the_named_adapter() {
        struct Name;
        impl AdapterVisitor for Name {
            type Output = &'static str;
            fn visit<A: MapAdapter + Clone>(self, adapter: A) -> &'static str {
                adapter.name()
            }
        }

        for kind in MapKind::ALL {
            assert_eq!(kind.visit(Name), kind.as_str());
        }
    }

    #[test]
    fn quiescent_context_counts_updates() {
        let mut ctx = QuiescentContext::default();
        ThreadContext::<()>::register(&mut ctx);
        ThreadContext::<()>::update(&mut ctx, &());
        ThreadContext::<()>::update(&mut ctx, &());
        assert!(ctx.is_registered());
        assert_eq!(ctx.updates(), 2);
        ThreadContext::<()>::unregister(&mut ctx);
        assert!(!ctx.is_registered());
    }
}
