//! Memory orderings for the harness's own synchronization.
//!
//! The harness synchronizes on exactly two things: the stop flag and the
//! start barrier. Map operations carry their own ordering.

use std::sync::atomic::Ordering;

/// Ordering for writing and polling the stop flag.
/// The flag decides when to stop measuring, it publishes no data.
pub const STOP_ORD: Ordering = Ordering::Relaxed;

/// Ordering for publishing pending kicks.
/// Pairs with the waiter's Acquire claim.
pub const KICK_ORD: Ordering = Ordering::Release;

/// Ordering for a waiter claiming a kick.
pub const CLAIM_SUCCESS: Ordering = Ordering::AcqRel;

/// Ordering for a failed claim attempt; only the current count is needed.
pub const CLAIM_FAILURE: Ordering = Ordering::Relaxed;

/// Ordering for spinning on the pending kick count.
pub const SPIN_ORD: Ordering = Ordering::Acquire;
