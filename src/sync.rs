//! Start/stop synchronization for measurement chunks.
//!
//! A chunk starts when the driver (worker 0) kicks every other active worker
//! through a [`StartBarrier`], and ends when the driver exhausts its
//! iteration budget and raises the [`StopToken`]. Followers have no budget of
//! their own; they poll the token at several points per iteration.
//!
//! Two barriers are provided:
//!
//! | Barrier | Wait | Use |
//! |---------|------|-----|
//! | [`SpinKicker`] | busy-wait | default, lowest release latency |
//! | [`CondvarKicker`] | `parking_lot` condvar | oversubscribed machines |

use std::fmt as StdFmt;
use std::sync::atomic::{AtomicBool, AtomicUsize};

use parking_lot::{Condvar, Mutex};

use crate::ordering::{CLAIM_FAILURE, CLAIM_SUCCESS, KICK_ORD, SPIN_ORD, STOP_ORD};

// ============================================================================
//  StopToken
// ============================================================================

/// Cooperative stop flag shared by all workers of a sweep.
///
/// Written by the driver only, read by everyone with relaxed loads. Reset by
/// the coordinator before each chunk while no worker is running.
#[derive(Default)]
pub struct StopToken {
    done: AtomicBool,
}

impl StopToken {
    /// New token in the running state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
        }
    }

    /// Clear the flag for the next chunk.
    ///
    /// Only called between chunks, when every worker is idle.
    #[inline]
    pub fn reset(&self) {
        self.done.store(false, STOP_ORD);
    }

    /// Raise the flag; followers stop at their next poll point.
    #[inline]
    pub fn signal(&self) {
        self.done.store(true, STOP_ORD);
    }

    /// Poll the flag.
    #[must_use]
    #[inline(always)]
    pub fn is_stopped(&self) -> bool {
        self.done.load(STOP_ORD)
    }

    /// Guard that raises the flag when dropped, including during unwinding.
    ///
    /// The driver holds one for the length of its loop so that a panicking
    /// map cannot leave followers spinning on an unbounded budget.
    #[must_use = "the flag is raised when the guard is dropped"]
    pub const fn signal_on_drop(&self) -> SignalOnDrop<'_> {
        SignalOnDrop { token: self }
    }
}

/// Raises its [`StopToken`] on drop. See [`StopToken::signal_on_drop`].
#[derive(Debug)]
pub struct SignalOnDrop<'a> {
    token: &'a StopToken,
}

impl Drop for SignalOnDrop<'_> {
    fn drop(&mut self) {
        self.token.signal();
    }
}

impl StdFmt::Debug for StopToken {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("StopToken")
            .field("done", &self.is_stopped())
            .finish()
    }
}

// ============================================================================
//  StartBarrier
// ============================================================================

/// Single-producer, multi-consumer start barrier.
///
/// Each `kick(n)` releases exactly `n` calls to `wait_for_kick`, regardless
/// of whether the waiters arrive before or after the kick. `kick` returns
/// once all `n` have been released, so the driver starts its clock together
/// with the followers.
pub trait StartBarrier: Send + Sync {
    /// Release `waiters` followers and wait until they have all left.
    fn kick(&self, waiters: usize);

    /// Block until released by a kick.
    fn wait_for_kick(&self);
}

/// Which barrier implementation a sweep should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarrierKind {
    /// [`SpinKicker`].
    #[default]
    Spin,
    /// [`CondvarKicker`].
    Condvar,
}

impl BarrierKind {
    /// Construct the selected barrier.
    #[must_use]
    pub fn build(self) -> Box<dyn StartBarrier> {
        match self {
            Self::Spin => Box::new(SpinKicker::new()),
            Self::Condvar => Box::new(CondvarKicker::new()),
        }
    }
}

// ============================================================================
//  SpinKicker
// ============================================================================

/// Busy-wait barrier built on a pending-kick counter.
///
/// The driver adds `n` pending kicks; each waiter claims one with a CAS. No
/// OS-level blocking happens on either side.
#[derive(Debug, Default)]
pub struct SpinKicker {
    pending: AtomicUsize,
}

impl SpinKicker {
    /// New barrier with nothing pending.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: AtomicUsize::new(0),
        }
    }

    /// Kicks published but not yet claimed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(SPIN_ORD)
    }
}

impl StartBarrier for SpinKicker {
    fn kick(&self, waiters: usize) {
        if waiters == 0 {
            return;
        }

        self.pending.fetch_add(waiters, KICK_ORD);
        while self.pending.load(SPIN_ORD) != 0 {
            std::hint::spin_loop();
        }
    }

    fn wait_for_kick(&self) {
        loop {
            let pending = self.pending.load(SPIN_ORD);
            if pending > 0
                && self
                    .pending
                    .compare_exchange_weak(pending, pending - 1, CLAIM_SUCCESS, CLAIM_FAILURE)
                    .is_ok()
            {
                return;
            }
            std::hint::spin_loop();
        }
    }
}

// ============================================================================
//  CondvarKicker
// ============================================================================

/// Blocking barrier for machines with more workers than cores, where
/// spinning followers would steal time from the driver.
#[derive(Debug, Default)]
pub struct CondvarKicker {
    pending: Mutex<usize>,
    changed: Condvar,
}

impl CondvarKicker {
    /// New barrier with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StartBarrier for CondvarKicker {
    fn kick(&self, waiters: usize) {
        if waiters == 0 {
            return;
        }

        let mut pending = self.pending.lock();
        *pending += waiters;
        self.changed.notify_all();
        while *pending != 0 {
            self.changed.wait(&mut pending);
        }
    }

    fn wait_for_kick(&self) {
        let mut pending = self.pending.lock();
        while *pending == 0 {
            self.changed.wait(&mut pending);
        }
        *pending -= 1;
        if *pending == 0 {
            self.changed.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::thread;

    #[test]
    fn stop_token_round_trip() {
        let token = StopToken::new();
        assert!(!token.is_stopped());
        token.signal();
        assert!(token.is_stopped());
        token.reset();
        assert!(!token.is_stopped());
    }

    #[test]
    fn guard_signals_on_drop_and_unwind() {
        let token = StopToken::new();
        drop(token.signal_on_drop());
        assert!(token.is_stopped());

        let token = Arc::new(StopToken::new());
        let unwound = {
            let token = Arc::clone(&token);
            thread::spawn(move || {
                let _guard = token.signal_on_drop();
                panic!("map failed mid-chunk");
            })
            .join()
        };
        assert!(unwound.is_err());
        assert!(token.is_stopped());
    }

    fn release_all(barrier: Arc<dyn StartBarrier>, waiters: usize, rounds: usize) {
        let released = Arc::new(AtomicUsize::new(0));

        for _ in 0..rounds {
            let handles: Vec<_> = (0..waiters)
                .map(|_| {
                    let barrier = Arc::clone(&barrier);
                    let released = Arc::clone(&released);
                    thread::spawn(move || {
                        barrier.wait_for_kick();
                        released.fetch_add(1, Ordering::Relaxed);
                    })
                })
                .collect();

            barrier.kick(waiters);

            for h in handles {
                h.join().expect("waiter panicked");
            }
        }

        assert_eq!(released.load(Ordering::Relaxed), waiters * rounds);
    }

    #[test]
    fn spin_kicker_releases_every_waiter() {
        release_all(Arc::new(SpinKicker::new()), 4, 20);
    }

    #[test]
    fn condvar_kicker_releases_every_waiter() {
        release_all(Arc::new(CondvarKicker::new()), 4, 20);
    }

    #[test]
    fn kick_before_waiters_arrive_is_not_lost() {
        let barrier = Arc::new(SpinKicker::new());

        let driver = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.kick(2))
        };

        // Let the kick land first.
        while barrier.pending() == 0 {
            std::hint::spin_loop();
        }

        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || barrier.wait_for_kick())
            })
            .collect();

        for w in waiters {
            w.join().expect("waiter panicked");
        }
        driver.join().expect("driver panicked");
        assert_eq!(barrier.pending(), 0);
    }

    #[test]
    fn kick_zero_returns_immediately() {
        SpinKicker::new().kick(0);
        CondvarKicker::new().kick(0);
    }

    #[test]
    fn barrier_kind_builds_both() {
        for kind in [BarrierKind::Spin, BarrierKind::Condvar] {
            let barrier: Arc<dyn StartBarrier> = Arc::from(kind.build());
            release_all(barrier, 2, 3);
        }
    }
}
