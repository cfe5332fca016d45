//! Persistent worker pool.
//!
//! A [`WorkerPool`] owns one OS thread per worker slot for its whole
//! lifetime. Each thread builds its own state `S` on startup, so the state
//! never crosses threads and may hold thread-bound handles (epoch
//! participants, guards). Jobs borrow that state mutably and run to
//! completion; [`WorkerPool::kick_one`] and [`WorkerPool::kick_multi`] block
//! until every dispatched job has returned.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{self as channel, Receiver, Sender};

use crate::error::{HarnessError, Result};
use crate::tracing_helpers::{debug_log, error_log};

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Shared job run concurrently on several workers.
pub type MultiJob<S, R> = Arc<dyn Fn(&mut S) -> R + Send + Sync + 'static>;

/// Fixed set of persistent worker threads with thread-local state.
pub struct WorkerPool<S> {
    senders: Vec<Sender<Job<S>>>,
    handles: Vec<JoinHandle<()>>,
}

impl<S: 'static> WorkerPool<S> {
    /// Spawn `size` workers; worker `i` starts by calling `init(i)`.
    ///
    /// # Errors
    ///
    /// [`HarnessError::NoWorkers`] if `size` is zero,
    /// [`HarnessError::Spawn`] if a thread cannot be created.
    pub fn spawn<F>(size: usize, init: F) -> Result<Self>
    where
        F: Fn(usize) -> S + Send + Sync + 'static,
    {
        if size == 0 {
            return Err(HarnessError::NoWorkers);
        }

        let init = Arc::new(init);
        let mut pool = Self {
            senders: Vec::with_capacity(size),
            handles: Vec::with_capacity(size),
        };

        for index in 0..size {
            let (tx, rx) = channel::unbounded::<Job<S>>();
            let init = Arc::clone(&init);
            let handle = thread::Builder::new()
                .name(format!("mapscale-worker-{index}"))
                .spawn(move || run_jobs(index, &*init, &rx))
                .map_err(|source| HarnessError::Spawn { index, source })?;

            pool.senders.push(tx);
            pool.handles.push(handle);
        }

        debug_log!(workers = size, "worker pool started");
        Ok(pool)
    }

    /// Number of worker slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// Always false; a pool has at least one worker.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Run `job` on worker `index` and wait for its result.
    ///
    /// # Errors
    ///
    /// [`HarnessError::WorkerPanicked`] if the worker is gone or the job
    /// panicked.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn kick_one<R, F>(&self, index: usize, job: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        self.send(
            index,
            Box::new(move |state: &mut S| {
                let _ = tx.send(job(state));
            }),
        )?;
        rx.recv().map_err(|_| HarnessError::WorkerPanicked { index })
    }

    /// Run `job` concurrently on workers `0..count` and collect the results
    /// in worker order.
    ///
    /// # Errors
    ///
    /// [`HarnessError::WorkerPanicked`] naming the first worker that failed
    /// to report back.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the pool size.
    pub fn kick_multi<R>(&self, count: usize, job: MultiJob<S, R>) -> Result<Vec<R>>
    where
        R: Send + 'static,
    {
        assert!(count <= self.len(), "kick_multi beyond pool size");

        let (tx, rx) = channel::bounded(count);
        for index in 0..count {
            let tx = tx.clone();
            let job = Arc::clone(&job);
            self.send(
                index,
                Box::new(move |state: &mut S| {
                    let _ = tx.send((index, job(state)));
                }),
            )?;
        }
        drop(tx);

        let mut results: Vec<Option<R>> = (0..count).map(|_| None).collect();
        for (index, result) in rx.iter().take(count) {
            results[index] = Some(result);
        }

        results
            .into_iter()
            .enumerate()
            .map(|(index, result)| result.ok_or(HarnessError::WorkerPanicked { index }))
            .collect()
    }

    fn send(&self, index: usize, job: Job<S>) -> Result<()> {
        self.senders[index]
            .send(job)
            .map_err(|_| HarnessError::WorkerPanicked { index })
    }
}

impl<S> Drop for WorkerPool<S> {
    fn drop(&mut self) {
        // Closing the channels ends each worker's receive loop.
        self.senders.clear();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error_log!("worker thread exited by panic");
            }
        }
    }
}

fn run_jobs<S, F>(index: usize, init: &F, rx: &Receiver<Job<S>>)
where
    F: Fn(usize) -> S,
{
    let mut state = init(index);
    for job in rx {
        job(&mut state);
    }
    debug_log!(worker = index, "worker exiting");
}

/// Number of physical cores, at least one.
#[must_use]
pub fn physical_core_count() -> usize {
    num_cpus::get_physical().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn state_is_built_on_the_worker_thread() {
        let pool = WorkerPool::spawn(3, |index| (index, thread::current().id()))
            .expect("spawn");

        for index in 0..3 {
            let (seen, built_on) = pool
                .kick_one(index, |state: &mut (usize, thread::ThreadId)| *state)
                .expect("kick_one");
            assert_eq!(seen, index);
            assert_ne!(built_on, thread::current().id());
        }
    }

    #[test]
    fn state_persists_between_jobs() {
        // Cell is !Sync; it never leaves its worker.
        let pool = WorkerPool::spawn(2, |_| Cell::new(0_u32)).expect("spawn");

        let bump: MultiJob<Cell<u32>, ()> = Arc::new(|c: &mut Cell<u32>| c.set(c.get() + 1));
        for _ in 0..5 {
            pool.kick_multi(2, Arc::clone(&bump)).expect("kick_multi");
        }

        let read: MultiJob<Cell<u32>, u32> = Arc::new(|c: &mut Cell<u32>| c.get());
        assert_eq!(pool.kick_multi(2, read).expect("kick_multi"), vec![5, 5]);
    }

    #[test]
    fn kick_multi_only_touches_prefix() {
        let pool = WorkerPool::spawn(4, |_| 0_usize).expect("spawn");
        let bump: MultiJob<usize, ()> = Arc::new(|n: &mut usize| *n += 1);
        pool.kick_multi(2, bump).expect("kick_multi");

        let read: MultiJob<usize, usize> = Arc::new(|n: &mut usize| *n);
        assert_eq!(pool.kick_multi(4, read).expect("kick_multi"), vec![1, 1, 0, 0]);
    }

    #[test]
    fn results_come_back_in_worker_order() {
        let pool = WorkerPool::spawn(4, |index| index).expect("spawn");
        let scaled: MultiJob<usize, usize> = Arc::new(|i: &mut usize| *i * 10);
        assert_eq!(pool.kick_multi(4, scaled).expect("kick_multi"), vec![0, 10, 20, 30]);
    }

    #[test]
    fn panicking_job_is_reported() {
        let pool = WorkerPool::spawn(2, |_| ()).expect("spawn");
        let err = pool
            .kick_one(1, |_: &mut ()| -> u32 { panic!("map exploded") })
            .unwrap_err();
        assert!(matches!(err, HarnessError::WorkerPanicked { index: 1 }));

        // The other worker is unaffected.
        assert_eq!(pool.kick_one(0, |_: &mut ()| 7_u32).expect("kick_one"), 7);
    }

    #[test]
    fn zero_workers_is_an_error() {
        assert!(matches!(
            WorkerPool::spawn(0, |_| ()),
            Err(HarnessError::NoWorkers)
        ));
    }

    #[test]
    fn physical_cores_positive() {
        assert!(physical_core_count() >= 1);
    }
}
