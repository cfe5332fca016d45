//! Key-space partitioning.
//!
//! Worker `i` of `n` owns a disjoint slice of the 32-bit index space. Indices
//! inside a slice are walked sequentially by the worker's cursors and
//! scrambled into map keys by multiplying with an odd constant, so that
//! consecutive indices land far apart in the map's hash or bucket structure.
//!
//! Keys `0` and `1` are reserved sentinels for some maps (empty and
//! tombstone markers). Slots that scramble to a sentinel are skipped by the
//! workload; the cursor still advances past them.

use std::fmt as StdFmt;

/// Odd multiplier scattering sequential indices across the key space.
pub const PRIME: u32 = 0x4190_ab09;

/// Exclusive upper bound of the index space (`2^32`).
pub const KEY_SPACE_END: u64 = 1 << 32;

/// Half-open interval `[lo, hi)` of indices owned by one worker.
///
/// Bounds are `u64` because the last range ends at `2^32`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyRange {
    lo: u64,
    hi: u64,
}

impl KeyRange {
    /// Create a range.
    ///
    /// # Panics
    ///
    /// Panics if the range is empty or leaves the index space `[1, 2^32)`.
    #[must_use]
    pub const fn new(lo: u64, hi: u64) -> Self {
        assert!(lo >= 1, "index 0 is outside the key space");
        assert!(lo < hi, "key range must be non-empty");
        assert!(hi <= KEY_SPACE_END, "key range must end at or below 2^32");
        Self { lo, hi }
    }

    /// Inclusive lower bound.
    #[must_use]
    #[inline(always)]
    pub const fn lo(&self) -> u64 {
        self.lo
    }

    /// Exclusive upper bound.
    #[must_use]
    #[inline(always)]
    pub const fn hi(&self) -> u64 {
        self.hi
    }

    /// Number of indices in the range.
    #[must_use]
    #[inline(always)]
    pub const fn len(&self) -> u64 {
        self.hi - self.lo
    }

    /// Always false; ranges are non-empty by construction.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// True if `index` lies inside the range.
    #[must_use]
    #[inline(always)]
    pub const fn contains(&self, index: u64) -> bool {
        self.lo <= index && index < self.hi
    }

    /// The index after `index`, wrapping from `hi - 1` back to `lo`.
    #[must_use]
    #[inline(always)]
    pub const fn advance(&self, index: u64) -> u64 {
        let next = index + 1;
        if next == self.hi { self.lo } else { next }
    }

    /// Forward distance from `from` to `to`, walking with wraparound.
    #[must_use]
    #[inline(always)]
    pub const fn distance(&self, from: u64, to: u64) -> u64 {
        if to >= from {
            to - from
        } else {
            self.len() - (from - to)
        }
    }
}

impl StdFmt::Debug for KeyRange {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        write!(f, "KeyRange[{:#x}, {:#x})", self.lo, self.hi)
    }
}

/// Compute the range of worker `index` out of `num_workers`.
///
/// Worker `i` owns `[step * i + 1, step * (i + 1) + 1)` with
/// `step = floor(2^32 / num_workers)`. The last worker's upper bound is
/// pinned to `2^32`, absorbing the division remainder (or the overshoot when
/// `num_workers` divides `2^32`), so the ranges tile `[1, 2^32)` exactly.
///
/// # Panics
///
/// Panics if `num_workers` is zero or `index >= num_workers`.
#[must_use]
pub fn key_range(index: usize, num_workers: usize) -> KeyRange {
    assert!(num_workers > 0, "at least one worker is required");
    assert!(index < num_workers, "worker index out of bounds");

    let step = KEY_SPACE_END / num_workers as u64;
    let lo = step * index as u64 + 1;
    let hi = if index + 1 == num_workers {
        KEY_SPACE_END
    } else {
        step * (index as u64 + 1) + 1
    };
    KeyRange::new(lo, hi)
}

/// Ranges for every worker slot, in slot order.
///
/// # Panics
///
/// Panics if `num_workers` is zero.
#[must_use]
pub fn partition(num_workers: usize) -> Vec<KeyRange> {
    (0..num_workers).map(|i| key_range(i, num_workers)).collect()
}

/// Scramble an index into a map key.
#[must_use]
#[inline(always)]
#[expect(clippy::cast_possible_truncation, reason = "indices are below 2^32")]
pub const fn key_for_index(index: u64) -> u32 {
    (index as u32).wrapping_mul(PRIME)
}

/// True for the reserved keys `0` and `1`.
#[must_use]
#[inline(always)]
pub const fn is_sentinel(key: u32) -> bool {
    key < 2
}
