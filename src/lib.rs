//! # `mapscale`
//!
//! A scalability benchmark harness for concurrent associative maps.
//!
//! The harness drives a thread-safe map through a ratio-controlled mix of
//! inserts, lookups and removes on 1, 2, ..., N persistent worker threads
//! and reports aggregate throughput at each worker count.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`partition`] | Disjoint per-worker key ranges, index-to-key scrambling |
//! | [`workload`] | Per-worker cursors and the insert/lookup/remove stream |
//! | [`sync`] | Start barrier and cooperative stop flag |
//! | [`stats`] | Counters, summation, trimmed aggregation over chunks |
//! | [`sweep`] | Orchestrates chunks at growing worker counts |
//! | [`dispatch`] | Persistent worker pool |
//! | [`map`] | Map and reclamation contracts, shipped adapters |
//! | [`report`] | Text and JSON reports |
//! | [`matrix`] | Preset ratio matrix runner |
//!
//! ## Measurement Protocol
//!
//! Worker 0 is the driver: it owns a fixed iteration budget per chunk,
//! releases the other workers through the start barrier and raises the stop
//! flag when its budget is spent. The others run until they see the flag.
//! Each chunk yields one summed [`Stats`]; the fastest fraction of chunks at a
//! worker count is summed into that count's [`DataPoint`].
//!
//! ```rust,no_run
//! use mapscale::{DashMapAdapter, RunConfig, Sweep};
//!
//! let report = Sweep::new(DashMapAdapter, RunConfig::default())
//!     .max_workers(4)
//!     .run()?;
//!
//! for point in &report.points {
//!     println!("{} workers: {:.0} ops/s", point.num_workers, point.totals.ops_per_second());
//! }
//! # Ok::<(), mapscale::HarnessError>(())
//! ```
//!
//! ## Logging
//!
//! With the `tracing` feature (default) the library emits sweep, point and
//! chunk events through `tracing`. The measured loop never logs.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Counter hooks on the measured path are inlined on purpose.
#![allow(clippy::inline_always)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod map;
pub mod matrix;
pub mod ordering;
pub mod partition;
pub mod report;
pub mod stats;
pub mod sweep;
pub mod sync;
pub mod workload;

mod tracing_helpers;

// Re-export main types for convenience
pub use config::RunConfig;
pub use dispatch::{WorkerPool, physical_core_count};
pub use error::{HarnessError, Result};
pub use map::{
    AdapterVisitor, ConcurrentMap, DashMapAdapter, LockedAdapter, MapAdapter, MapKind,
    PapayaAdapter, SkipMapAdapter, ThreadContext,
};
pub use matrix::MatrixRunner;
pub use partition::KeyRange;
pub use report::{DataPoint, Report, ReportMode};
pub use stats::{ChunkAggregator, Stats};
pub use sweep::Sweep;
pub use sync::{BarrierKind, StartBarrier, StopToken};
pub use workload::{ChunkPlan, Role, WorkerState};
