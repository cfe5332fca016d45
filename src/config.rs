//! Run configuration.
//!
//! A [`RunConfig`] is fixed for the duration of a sweep. Defaults match the
//! harness's historical settings: four reads per write, 10 000 iterations per
//! chunk, 200 chunks, balanced inserts and removes.

use serde::Serialize;

use crate::error::{HarnessError, Result};

/// Keys pre-populated into each worker's range before the first chunk.
pub const NUM_KEYS_PER_THREAD: usize = 2000;

/// Default number of lookups per write phase.
pub const DEFAULT_READS_PER_WRITE: usize = 4;

/// Default number of writes per write phase.
pub const DEFAULT_WRITES_PER_READ: usize = 1;

/// Default iteration budget of the driver worker per chunk.
pub const DEFAULT_ITERS_PER_CHUNK: usize = 10_000;

/// Default number of measured chunks per worker count.
pub const DEFAULT_CHUNKS: usize = 200;

/// Default fraction of (fastest) chunks kept by the trimmed aggregate.
pub const DEFAULT_KEEP_CHUNK_FRACTION: f64 = 1.0;

/// Default insert weight of the insert:remove ratio.
pub const DEFAULT_INSERTS_PER_REMOVE: usize = 1;

/// Default remove weight of the insert:remove ratio.
pub const DEFAULT_REMOVES_PER_INSERT: usize = 1;

/// Immutable parameters of one benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Keys pre-populated per worker range.
    pub num_keys_per_thread: usize,

    /// Lookups performed in each of the two read phases of an iteration.
    pub reads_per_write: usize,

    /// Baseline inserts (and maximum removes) per iteration.
    pub writes_per_read: usize,

    /// Iteration budget of the driver per chunk.
    pub iters_per_chunk: usize,

    /// Insert weight of the insert:remove ratio.
    pub inserts_per_remove: usize,

    /// Remove weight of the insert:remove ratio.
    pub removes_per_insert: usize,

    /// Chunks measured per worker count.
    pub chunks: usize,

    /// Fraction of chunks (lowest duration first) that contribute to a point.
    pub keep_chunk_fraction: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_keys_per_thread: NUM_KEYS_PER_THREAD,
            reads_per_write: DEFAULT_READS_PER_WRITE,
            writes_per_read: DEFAULT_WRITES_PER_READ,
            iters_per_chunk: DEFAULT_ITERS_PER_CHUNK,
            inserts_per_remove: DEFAULT_INSERTS_PER_REMOVE,
            removes_per_insert: DEFAULT_REMOVES_PER_INSERT,
            chunks: DEFAULT_CHUNKS,
            keep_chunk_fraction: DEFAULT_KEEP_CHUNK_FRACTION,
        }
    }
}

impl RunConfig {
    /// Check the run can start.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::InvalidRatio`] if removes outweigh inserts.
    /// - [`HarnessError::NoInserts`] if the insert weight is zero.
    /// - [`HarnessError::NoChunks`] if no chunk would be measured.
    /// - [`HarnessError::InvalidKeepFraction`] if the fraction is outside `[0, 1]`.
    /// - [`HarnessError::WorkloadOverflow`] if a chunk's operation budget
    ///   does not fit in `u64`.
    pub fn validate(&self) -> Result<()> {
        if self.inserts_per_remove < self.removes_per_insert {
            return Err(HarnessError::InvalidRatio {
                inserts_per_remove: self.inserts_per_remove,
                removes_per_insert: self.removes_per_insert,
            });
        }

        if self.inserts_per_remove == 0 {
            return Err(HarnessError::NoInserts);
        }

        if self.chunks == 0 {
            return Err(HarnessError::NoChunks);
        }

        if !(0.0..=1.0).contains(&self.keep_chunk_fraction) {
            return Err(HarnessError::InvalidKeepFraction(self.keep_chunk_fraction));
        }

        if self.chunk_budget().is_none() {
            return Err(HarnessError::WorkloadOverflow);
        }

        Ok(())
    }

    /// Writes of one driver chunk, `2 * iters * writes_per_read`, provided
    /// every product the chunk plan and the driver's counters form stays
    /// within `u64`.
    fn chunk_budget(&self) -> Option<u64> {
        let iters = u64::try_from(self.iters_per_chunk).ok()?;
        let reads = u64::try_from(self.reads_per_write).ok()?;
        let writes = u64::try_from(self.writes_per_read).ok()?;
        let inserts = u64::try_from(self.inserts_per_remove).ok()?;
        let removes = u64::try_from(self.removes_per_insert).ok()?;

        iters.checked_mul(reads)?.checked_mul(2)?;
        inserts.checked_add(removes)?;
        let total_writes = iters.checked_mul(writes)?.checked_mul(2)?;
        total_writes.checked_mul(inserts)?;
        Some(total_writes)
    }

    /// Total keys pre-populated across `workers` ranges.
    #[must_use]
    pub const fn population(&self, workers: usize) -> usize {
        self.num_keys_per_thread * workers
    }
}
