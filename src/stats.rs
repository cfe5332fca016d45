//! Operation counters and trimmed aggregation across chunks.
//!
//! Each worker produces one [`Stats`] per chunk. Per-worker stats are summed
//! into a chunk total, chunk totals are collected by a [`ChunkAggregator`],
//! and the reported figure for a worker count is the sum of the chunks with
//! the smallest duration.
//!
//! Times are kept as [`Duration`] (integer nanoseconds) so that summation is
//! exactly associative and commutative; conversion to seconds happens only
//! when a report is rendered.

use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::time::Duration;

use serde::Serialize;

// ============================================================================
//  Stats
// ============================================================================

/// Counters and timings of one worker (or a sum of workers) over a chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Stats {
    /// All map operations (reads + writes).
    pub ops_done: u64,
    /// Lookups.
    pub reads_done: u64,
    /// Inserts + removes.
    pub writes_done: u64,
    /// Inserts.
    pub inserts_done: u64,
    /// Removes.
    pub removes_done: u64,
    /// Wall time of the active iteration loop.
    pub duration: Duration,
    /// Time spent inside insert calls.
    pub total_insert_time: Duration,
    /// Time spent inside remove calls.
    pub total_remove_time: Duration,
}

impl Stats {
    /// Record one lookup.
    #[inline(always)]
    pub const fn record_read(&mut self) {
        self.ops_done += 1;
        self.reads_done += 1;
    }

    /// Record one insert that took `elapsed`.
    #[inline(always)]
    pub fn record_insert(&mut self, elapsed: Duration) {
        self.ops_done += 1;
        self.writes_done += 1;
        self.inserts_done += 1;
        self.total_insert_time += elapsed;
    }

    /// Record one remove that took `elapsed`.
    #[inline(always)]
    pub fn record_remove(&mut self, elapsed: Duration) {
        self.ops_done += 1;
        self.writes_done += 1;
        self.removes_done += 1;
        self.total_remove_time += elapsed;
    }

    /// Operations per second over `duration`, or 0 for an empty interval.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn ops_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.ops_done as f64 / secs
        } else {
            0.0
        }
    }

    /// Mean insert latency, zero if nothing was inserted.
    #[must_use]
    pub fn mean_insert_time(&self) -> Duration {
        mean(self.total_insert_time, self.inserts_done)
    }

    /// Mean remove latency, zero if nothing was removed.
    #[must_use]
    pub fn mean_remove_time(&self) -> Duration {
        mean(self.total_remove_time, self.removes_done)
    }

    /// Achieved inserts per remove (`inf` when nothing was removed).
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn insert_remove_ratio(&self) -> f64 {
        self.inserts_done as f64 / self.removes_done as f64
    }

    /// Achieved reads per write (`inf` when nothing was written).
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn read_write_ratio(&self) -> f64 {
        self.reads_done as f64 / self.writes_done as f64
    }
}

#[expect(clippy::cast_possible_truncation)]
fn mean(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos((total.as_nanos() / u128::from(count)) as u64)
}

impl AddAssign for Stats {
    fn add_assign(&mut self, other: Self) {
        self.ops_done += other.ops_done;
        self.reads_done += other.reads_done;
        self.writes_done += other.writes_done;
        self.inserts_done += other.inserts_done;
        self.removes_done += other.removes_done;
        self.duration += other.duration;
        self.total_insert_time += other.total_insert_time;
        self.total_remove_time += other.total_remove_time;
    }
}

impl Add for Stats {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl Sum for Stats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a Self> for Stats {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// ============================================================================
//  ChunkAggregator
// ============================================================================

/// Collects chunk totals at one worker count and produces the trimmed sum.
///
/// Chunks are ranked by duration and only the fastest
/// `floor(chunks * keep_fraction)` contribute. This is a one-sided trim that
/// favors best-case chunks; `keep_fraction = 1.0` keeps every chunk.
#[derive(Debug, Clone)]
pub struct ChunkAggregator {
    keep_fraction: f64,
    totals: Vec<Stats>,
}

impl ChunkAggregator {
    /// Aggregator expecting roughly `chunks` chunk totals.
    #[must_use]
    pub fn new(keep_fraction: f64, chunks: usize) -> Self {
        Self {
            keep_fraction,
            totals: Vec::with_capacity(chunks),
        }
    }

    /// Sum one chunk's per-worker stats and record the total.
    pub fn record_chunk<I>(&mut self, workers: I) -> Stats
    where
        I: IntoIterator<Item = Stats>,
    {
        let total: Stats = workers.into_iter().sum();
        self.totals.push(total);
        total
    }

    /// Chunk totals recorded so far, in recording order.
    #[must_use]
    pub fn chunks(&self) -> &[Stats] {
        &self.totals
    }

    /// How many chunks the trim keeps.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn kept_count(&self) -> usize {
        ((self.totals.len() as f64 * self.keep_fraction) as usize).min(self.totals.len())
    }

    /// Sum of the `kept_count()` chunks with the smallest duration.
    #[must_use]
    pub fn trimmed_total(&self) -> Stats {
        let mut sorted = self.totals.clone();
        sorted.sort_by_key(|s| s.duration);
        sorted.iter().take(self.kept_count()).sum()
    }

    /// Forget recorded chunks, keeping the allocation.
    pub fn clear(&mut self) {
        self.totals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(ops: u64, millis: u64) -> Stats {
        Stats {
            ops_done: ops,
            reads_done: ops,
            duration: Duration::from_millis(millis),
            ..Stats::default()
        }
    }

    #[test]
    fn record_helpers_update_all_counters() {
        let mut s = Stats::default();
        s.record_read();
        s.record_insert(Duration::from_nanos(30));
        s.record_insert(Duration::from_nanos(10));
        s.record_remove(Duration::from_nanos(5));

        assert_eq!(s.ops_done, 4);
        assert_eq!(s.reads_done, 1);
        assert_eq!(s.writes_done, 3);
        assert_eq!(s.inserts_done, 2);
        assert_eq!(s.removes_done, 1);
        assert_eq!(s.mean_insert_time(), Duration::from_nanos(20));
        assert_eq!(s.mean_remove_time(), Duration::from_nanos(5));
        assert!((s.insert_remove_ratio() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mean_of_nothing_is_zero() {
        let s = Stats::default();
        assert_eq!(s.mean_insert_time(), Duration::ZERO);
        assert_eq!(s.mean_remove_time(), Duration::ZERO);
        assert!(s.ops_per_second().abs() < f64::EPSILON);
    }

    #[test]
    fn sum_is_pointwise() {
        let total: Stats = [stats(3, 10), stats(4, 20)].into_iter().sum();
        assert_eq!(total.ops_done, 7);
        assert_eq!(total.duration, Duration::from_millis(30));
    }

    #[test]
    fn full_keep_sums_everything() {
        let mut agg = ChunkAggregator::new(1.0, 3);
        agg.record_chunk([stats(1, 30)]);
        agg.record_chunk([stats(2, 10), stats(2, 10)]);
        agg.record_chunk([stats(5, 20)]);

        assert_eq!(agg.kept_count(), 3);
        let total = agg.trimmed_total();
        assert_eq!(total.ops_done, 10);
        assert_eq!(total.duration, Duration::from_millis(70));
    }

    #[test]
    fn partial_keep_takes_fastest_chunks() {
        let mut agg = ChunkAggregator::new(0.5, 4);
        agg.record_chunk([stats(100, 40)]);
        agg.record_chunk([stats(1, 10)]);
        agg.record_chunk([stats(10, 30)]);
        agg.record_chunk([stats(1000, 20)]);

        assert_eq!(agg.kept_count(), 2);
        let total = agg.trimmed_total();
        assert_eq!(total.ops_done, 1001);
        assert_eq!(total.duration, Duration::from_millis(30));
    }

    #[test]
    fn zero_keep_is_empty() {
        let mut agg = ChunkAggregator::new(0.0, 2);
        agg.record_chunk([stats(1, 1)]);
        agg.record_chunk([stats(1, 2)]);
        assert_eq!(agg.kept_count(), 0);
        assert_eq!(agg.trimmed_total(), Stats::default());
    }

    #[test]
    fn clear_resets() {
        let mut agg = ChunkAggregator::new(1.0, 1);
        agg.record_chunk([stats(1, 1)]);
        agg.clear();
        assert!(agg.chunks().is_empty());
        assert_eq!(agg.trimmed_total(), Stats::default());
    }
}
