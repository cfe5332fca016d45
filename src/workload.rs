//! Per-worker operation stream.
//!
//! Each worker walks its own [`KeyRange`] with three cursors:
//!
//! ```text
//!   lo ... remove ........ lookup ........ insert ... hi
//!          [------------ live window ------)
//! ```
//!
//! Inserts happen at `insert`, removes at `remove`, and lookups sweep the
//! live window between them, so reads measure hits rather than misses. All
//! three cursors wrap from `hi` back to `lo`.
//!
//! One iteration is: inserts, lookups, removes, lookups. The insert count is
//! `writes_per_read`, bumped to twice that while the chunk still owes extra
//! inserts, so that over a chunk the insert:remove ratio lands on the
//! configured one. Removes stop once the chunk's remove budget is spent.
//!
//! The driver (worker 0) runs a fixed number of iterations and then raises
//! the stop flag; followers run until they see it.

use std::hint::black_box;
use std::time::Instant;

use crate::config::RunConfig;
use crate::map::{ConcurrentMap, ThreadContext};
use crate::partition::{KeyRange, is_sentinel, key_for_index};
use crate::stats::Stats;
use crate::sync::{StartBarrier, StopToken};

// ============================================================================
//  ChunkPlan
// ============================================================================

/// Per-chunk write budget derived from a [`RunConfig`].
///
/// All workers share one plan; it does not change between chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Driver's iteration budget.
    pub iters_per_chunk: u64,
    /// Lookups per read phase.
    pub reads_per_write: u64,
    /// Baseline inserts and maximum removes per iteration.
    pub writes_per_read: u64,
    /// Inserts the chunk should perform.
    pub insert_budget: u64,
    /// Removes the chunk may perform at most.
    pub remove_budget: u64,
    /// Inserts beyond the `writes_per_read` baseline, spread over the first
    /// iterations.
    pub extra_inserts: u64,
}

impl ChunkPlan {
    /// Derive the plan.
    ///
    /// Total writes are `2 * iters * writes_per_read`; inserts get the share
    /// `inserts_per_remove / (inserts_per_remove + removes_per_insert)`,
    /// rounded down, removes the rest.
    ///
    /// The config must have passed [`RunConfig::validate`].
    #[must_use]
    pub fn new(config: &RunConfig) -> Self {
        debug_assert!(config.validate().is_ok(), "plan built from invalid config");

        let iters = config.iters_per_chunk as u64;
        let writes_per_read = config.writes_per_read as u64;
        let inserts = config.inserts_per_remove as u64;
        let removes = config.removes_per_insert as u64;

        let total_writes = iters * writes_per_read * 2;
        let insert_budget = total_writes * inserts / (inserts + removes);
        let baseline = iters * writes_per_read;

        Self {
            iters_per_chunk: iters,
            reads_per_write: config.reads_per_write as u64,
            writes_per_read,
            insert_budget,
            remove_budget: total_writes - insert_budget,
            extra_inserts: insert_budget.saturating_sub(baseline),
        }
    }

    /// Fresh insert scheduler for one chunk.
    #[must_use]
    pub const fn insert_scheduler(&self) -> InsertScheduler {
        InsertScheduler {
            writes_per_read: self.writes_per_read,
            extra_target: self.extra_inserts,
            extra_done: 0,
        }
    }
}

// ============================================================================
//  InsertScheduler
// ============================================================================

/// Decides how many inserts each iteration performs.
///
/// Realizes the fractional part of the insert share as whole extra
/// `writes_per_read` batches at the start of the chunk.
#[derive(Debug, Clone)]
pub struct InsertScheduler {
    writes_per_read: u64,
    extra_target: u64,
    extra_done: u64,
}

impl InsertScheduler {
    /// Insert count for the next iteration.
    #[inline]
    pub const fn next_count(&mut self) -> u64 {
        if self.extra_done < self.extra_target {
            self.extra_done += self.writes_per_read;
            self.writes_per_read * 2
        } else {
            self.writes_per_read
        }
    }
}

// ============================================================================
//  Role
// ============================================================================

/// A worker's part in the start/stop protocol for one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Owns the iteration budget, releases followers, raises the stop flag.
    Driver {
        /// Followers to release at chunk start.
        followers: usize,
    },
    /// Waits for the kick and runs until the stop flag is raised.
    Follower,
}

impl Role {
    /// Role of worker `index` when `active` workers take part.
    #[must_use]
    pub const fn for_worker(index: usize, active: usize) -> Self {
        if index == 0 {
            Self::Driver {
                followers: active.saturating_sub(1),
            }
        } else {
            Self::Follower
        }
    }
}

// ============================================================================
//  WorkerState
// ============================================================================

/// Everything one worker owns across the whole sweep.
///
/// Created once on the worker's thread and reused for every chunk at every
/// worker count; no other thread ever touches it.
#[derive(Debug)]
pub struct WorkerState<C> {
    index: usize,
    range: KeyRange,
    insert_cursor: u64,
    remove_cursor: u64,
    lookup_cursor: u64,
    context: C,
    last_stats: Stats,
}

impl<C> WorkerState<C> {
    /// State for slot `index`, all cursors at the start of `range`.
    #[must_use]
    pub fn new(index: usize, range: KeyRange, context: C) -> Self {
        Self {
            index,
            range,
            insert_cursor: range.lo(),
            remove_cursor: range.lo(),
            lookup_cursor: range.lo(),
            context,
            last_stats: Stats::default(),
        }
    }

    /// Worker slot.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Owned key range.
    #[must_use]
    pub const fn range(&self) -> KeyRange {
        self.range
    }

    /// Next index to insert.
    #[must_use]
    pub const fn insert_cursor(&self) -> u64 {
        self.insert_cursor
    }

    /// Next index to remove.
    #[must_use]
    pub const fn remove_cursor(&self) -> u64 {
        self.remove_cursor
    }

    /// Next index to look up.
    #[must_use]
    pub const fn lookup_cursor(&self) -> u64 {
        self.lookup_cursor
    }

    /// Positions between the remove and insert cursors.
    #[must_use]
    pub const fn live_window(&self) -> u64 {
        self.range.distance(self.remove_cursor, self.insert_cursor)
    }

    /// Reclamation context.
    #[must_use]
    pub const fn context(&self) -> &C {
        &self.context
    }

    /// Stats of the most recent chunk.
    #[must_use]
    pub const fn last_stats(&self) -> Stats {
        self.last_stats
    }

    /// Register this thread with the map's reclamation scheme.
    pub fn register<M: ?Sized>(&mut self)
    where
        C: ThreadContext<M>,
    {
        self.context.register();
    }

    /// Unregister this thread from the map's reclamation scheme.
    pub fn unregister<M: ?Sized>(&mut self)
    where
        C: ThreadContext<M>,
    {
        self.context.unregister();
    }

    /// Insert `keys` consecutive indices starting at the insert cursor.
    ///
    /// Run once per sweep before the first chunk, so that lookups have a
    /// live window to read from.
    pub fn populate<M>(&mut self, map: &M, keys: usize)
    where
        M: ConcurrentMap + ?Sized,
    {
        debug_assert_eq!(
            self.insert_cursor, self.remove_cursor,
            "populate on a worker with live keys"
        );

        for _ in 0..keys {
            let key = key_for_index(self.insert_cursor);
            if !is_sentinel(key) {
                map.assign(key, key);
            }
            self.insert_cursor = self.range.advance(self.insert_cursor);
        }
    }

    /// Run one measured chunk and return its stats.
    ///
    /// The driver resets `stop`, kicks its followers and runs
    /// `plan.iters_per_chunk` iterations; followers wait for the kick and run
    /// until `stop` is raised. The driver raises `stop` when its loop ends,
    /// also when it unwinds out of a panicking map call. The returned duration covers the iteration
    /// loop only.
    pub fn run_chunk<M>(
        &mut self,
        map: &M,
        plan: &ChunkPlan,
        role: Role,
        stop: &StopToken,
        barrier: &dyn StartBarrier,
    ) -> Stats
    where
        M: ConcurrentMap + ?Sized,
        C: ThreadContext<M>,
    {
        let (budget, release) = match role {
            Role::Driver { followers } => {
                stop.reset();
                let release = stop.signal_on_drop();
                barrier.kick(followers);
                (plan.iters_per_chunk, Some(release))
            }
            Role::Follower => {
                barrier.wait_for_kick();
                (u64::MAX, None)
            }
        };

        let mut stats = Stats::default();
        let mut scheduler = plan.insert_scheduler();

        let start = Instant::now();
        for _ in 0..budget {
            if stop.is_stopped() {
                break;
            }

            self.insert_phase(map, scheduler.next_count(), &mut stats);
            self.lookup_phase(map, plan.reads_per_write, stop, &mut stats);
            if stats.removes_done < plan.remove_budget {
                self.remove_phase(map, plan, stop, &mut stats);
            }
            self.lookup_phase(map, plan.reads_per_write, stop, &mut stats);
        }
        stats.duration = start.elapsed();

        // Followers stop here, or during unwinding if the map panicked.
        drop(release);
        self.context.update(map);

        self.last_stats = stats;
        stats
    }

    #[inline]
    fn insert_phase<M>(&mut self, map: &M, count: u64, stats: &mut Stats)
    where
        M: ConcurrentMap + ?Sized,
    {
        for _ in 0..count {
            let key = key_for_index(self.insert_cursor);
            if !is_sentinel(key) {
                let start = Instant::now();
                map.assign(key, key);
                stats.record_insert(start.elapsed());
            }
            self.insert_cursor = self.range.advance(self.insert_cursor);
        }
    }

    #[inline]
    fn lookup_phase<M>(&mut self, map: &M, reads: u64, stop: &StopToken, stats: &mut Stats)
    where
        M: ConcurrentMap + ?Sized,
    {
        // Stay inside [remove, insert): behind it keys are gone, past it they
        // are not there yet.
        if self.range.distance(self.remove_cursor, self.lookup_cursor) >= self.live_window() {
            self.lookup_cursor = self.remove_cursor;
        }

        for _ in 0..reads {
            if stop.is_stopped() {
                break;
            }

            let key = key_for_index(self.lookup_cursor);
            if !is_sentinel(key) {
                black_box(map.get(key));
                stats.record_read();
            }

            self.lookup_cursor = self.range.advance(self.lookup_cursor);
            if self.lookup_cursor == self.insert_cursor {
                self.lookup_cursor = self.remove_cursor;
            }
        }
    }

    #[inline]
    fn remove_phase<M>(&mut self, map: &M, plan: &ChunkPlan, stop: &StopToken, stats: &mut Stats)
    where
        M: ConcurrentMap + ?Sized,
    {
        for _ in 0..plan.writes_per_read {
            if stop.is_stopped() || stats.removes_done >= plan.remove_budget {
                break;
            }
            debug_assert_ne!(
                self.remove_cursor, self.insert_cursor,
                "remove cursor caught up with insert cursor"
            );

            let key = key_for_index(self.remove_cursor);
            if !is_sentinel(key) {
                let start = Instant::now();
                map.erase(key);
                stats.record_remove(start.elapsed());
            }
            self.remove_cursor = self.range.advance(self.remove_cursor);
        }
    }
}
