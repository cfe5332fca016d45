//! Scalability sweep.
//!
//! A [`Sweep`] spawns one persistent worker per slot, creates the map,
//! pre-populates every slot's range, and then measures at 1, 2, ...,
//! `max_workers` active workers. Each step activates exactly one more
//! worker, runs `chunks` measured chunks and reduces them to one
//! [`DataPoint`]. The map and the worker states live for the whole sweep.
//!
//! ```text
//! spawn pool ─► register w0 ─► create map ─► populate all
//!     │
//!     └─► for n in 1..=max:
//!             register w(n-1)          (n > 1)
//!             repeat chunks: kick_multi(n, run_chunk) ─► ChunkAggregator
//!             emit DataPoint(n, trimmed total)
//!     drop map ─► unregister all ─► join pool
//! ```

use std::sync::Arc;

use crate::config::RunConfig;
use crate::dispatch::{MultiJob, WorkerPool, physical_core_count};
use crate::error::{HarnessError, Result};
use crate::map::MapAdapter;
use crate::partition::key_range;
use crate::report::{DataPoint, Report};
use crate::stats::{ChunkAggregator, Stats};
use crate::sync::{BarrierKind, StartBarrier, StopToken};
use crate::tracing_helpers::{debug_log, info_log, trace_log};
use crate::workload::{ChunkPlan, Role, WorkerState};

/// State every active worker reads during a chunk.
///
/// Shared by reference count for the lifetime of the sweep; workers never
/// own or drop the map.
pub struct SharedRunState<M> {
    /// Map under test.
    pub map: Arc<M>,
    /// Per-chunk budget.
    pub plan: ChunkPlan,
    /// Raised by the driver when its budget is spent.
    pub stop: StopToken,
    /// Start barrier between the driver and its followers.
    pub barrier: Box<dyn StartBarrier>,
}

impl<M> std::fmt::Debug for SharedRunState<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRunState")
            .field("plan", &self.plan)
            .field("stop", &self.stop)
            .finish_non_exhaustive()
    }
}

type Worker<A> = WorkerState<<A as MapAdapter>::Context>;

/// Sweep builder and runner for one map adapter.
#[derive(Debug)]
pub struct Sweep<A> {
    adapter: Arc<A>,
    config: RunConfig,
    max_workers: usize,
    barrier: BarrierKind,
}

impl<A: MapAdapter> Sweep<A> {
    /// Sweep up to the number of physical cores with a spin barrier.
    #[must_use]
    pub fn new(adapter: A, config: RunConfig) -> Self {
        Self {
            adapter: Arc::new(adapter),
            config,
            max_workers: physical_core_count(),
            barrier: BarrierKind::default(),
        }
    }

    /// Override the worker capacity.
    #[must_use]
    pub const fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Choose the start barrier.
    #[must_use]
    pub const fn barrier(mut self, barrier: BarrierKind) -> Self {
        self.barrier = barrier;
        self
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Worker capacity.
    #[must_use]
    pub const fn worker_capacity(&self) -> usize {
        self.max_workers
    }

    /// Report skeleton (header fields, no points) for this sweep.
    #[must_use]
    pub fn blank_report(&self) -> Report {
        Report::new(
            self.adapter.name(),
            self.config.population(self.max_workers),
            self.config,
        )
    }

    /// Run the sweep and collect the report.
    ///
    /// # Errors
    ///
    /// See [`Sweep::run_with`].
    pub fn run(&self) -> Result<Report> {
        self.run_with(|_| {})
    }

    /// Check that the sweep can start, without starting it.
    ///
    /// # Errors
    ///
    /// Configuration errors from [`RunConfig::validate`], or
    /// [`HarnessError::NoWorkers`] for a capacity of zero.
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        if self.max_workers == 0 {
            return Err(HarnessError::NoWorkers);
        }
        Ok(())
    }

    /// Run the sweep, calling `on_point` as each point is produced.
    ///
    /// # Errors
    ///
    /// - Configuration errors from [`RunConfig::validate`], before any
    ///   thread starts.
    /// - [`HarnessError::NoWorkers`] for a capacity of zero.
    /// - [`HarnessError::Spawn`] or [`HarnessError::WorkerPanicked`] from
    ///   the worker pool.
    pub fn run_with<F>(&self, mut on_point: F) -> Result<Report>
    where
        F: FnMut(&DataPoint),
    {
        self.validate()?;
        let max = self.max_workers;

        let mut report = self.blank_report();
        info_log!(
            map = self.adapter.name(),
            max_workers = max,
            population = report.population,
            "sweep starting"
        );

        let adapter = Arc::clone(&self.adapter);
        let pool: WorkerPool<Worker<A>> = WorkerPool::spawn(max, move |index| {
            WorkerState::new(index, key_range(index, max), adapter.thread_context(index))
        })?;

        pool.kick_one(0, |w: &mut Worker<A>| w.register::<A::Map>())?;

        let capacity = self.adapter.initial_capacity(report.population);
        let shared = Arc::new(SharedRunState {
            map: Arc::new(self.adapter.create_map(capacity)),
            plan: ChunkPlan::new(&self.config),
            stop: StopToken::new(),
            barrier: self.barrier.build(),
        });

        let keys = self.config.num_keys_per_thread;
        let populate: MultiJob<Worker<A>, ()> = {
            let shared = Arc::clone(&shared);
            Arc::new(move |w: &mut Worker<A>| w.populate(&*shared.map, keys))
        };
        pool.kick_multi(max, populate)?;
        debug_log!(capacity, keys_per_worker = keys, "map populated");

        for active in 1..=max {
            if active > 1 {
                pool.kick_one(active - 1, |w: &mut Worker<A>| w.register::<A::Map>())?;
            }

            let totals = self.measure(&pool, &shared, active)?;
            let point = DataPoint::new(active, totals);
            info_log!(
                workers = active,
                ops = totals.ops_done,
                seconds = totals.duration.as_secs_f64(),
                ops_per_sec = totals.ops_per_second(),
                "point"
            );

            on_point(&point);
            report.points.push(point);
        }

        drop(shared);
        let unregister: MultiJob<Worker<A>, ()> =
            Arc::new(|w: &mut Worker<A>| w.unregister::<A::Map>());
        pool.kick_multi(max, unregister)?;

        debug_log!("sweep finished");
        Ok(report)
    }

    /// Run all chunks at `active` workers and reduce them.
    fn measure(
        &self,
        pool: &WorkerPool<Worker<A>>,
        shared: &Arc<SharedRunState<A::Map>>,
        active: usize,
    ) -> Result<Stats> {
        let chunk: MultiJob<Worker<A>, Stats> = {
            let shared = Arc::clone(shared);
            Arc::new(move |w: &mut Worker<A>| {
                let role = Role::for_worker(w.index(), active);
                w.run_chunk(
                    &*shared.map,
                    &shared.plan,
                    role,
                    &shared.stop,
                    &*shared.barrier,
                )
            })
        };

        let mut aggregator =
            ChunkAggregator::new(self.config.keep_chunk_fraction, self.config.chunks);
        for index in 0..self.config.chunks {
            let per_worker = pool.kick_multi(active, Arc::clone(&chunk))?;
            let total = aggregator.record_chunk(per_worker);
            trace_log!(
                workers = active,
                chunk = index,
                ops = total.ops_done,
                micros = total.duration.as_micros(),
                "chunk"
            );
        }

        debug_log!(
            workers = active,
            kept = aggregator.kept_count(),
            chunks = aggregator.chunks().len(),
            "chunks trimmed"
        );
        Ok(aggregator.trimmed_total())
    }
}
