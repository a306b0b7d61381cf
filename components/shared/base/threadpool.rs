/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::thread_state::{self, ThreadState};

/// The state of the stream transport pool.
struct ThreadPoolState {
    /// The number of queued or running jobs.
    active_workers: u32,
    /// Whether the pool can accept additional work.
    active: bool,
}

/// Threadpool used for blocking stream operations: opening files, forcing
/// lazy streams and closing them once their description has been sent.
///
/// Every worker is marked as [`ThreadState::IO_WORKER`], so code running on
/// it may block on remote streams.
pub struct ThreadPool {
    pool: rayon::ThreadPool,
    state: Arc<(Mutex<ThreadPoolState>, Condvar)>,
}

impl ThreadPool {
    pub fn new(num_threads: usize, pool_name: String) -> Self {
        debug!("Creating new ThreadPool {pool_name} with {num_threads} threads!");
        let pool = rayon::ThreadPoolBuilder::new()
            .thread_name(move |i| format!("{pool_name}#{i}"))
            .num_threads(num_threads.max(1))
            .start_handler(|_| thread_state::initialize(ThreadState::IO_WORKER))
            .build()
            .expect("Failed to create stream transport pool");
        let state = Arc::new((
            Mutex::new(ThreadPoolState {
                active_workers: 0,
                active: true,
            }),
            Condvar::new(),
        ));
        Self { pool, state }
    }

    /// Spawn work on the thread-pool, if still active.
    ///
    /// Returns `false` when the pool is exiting and the work was dropped
    /// without running.
    pub fn spawn<OP>(&self, work: OP) -> bool
    where
        OP: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.state.0.lock();
            if !state.active {
                return false;
            }
            state.active_workers += 1;
        }

        let state = self.state.clone();
        self.pool.spawn(move || {
            work();
            let (lock, condvar) = &*state;
            let mut state = lock.lock();
            state.active_workers -= 1;
            if state.active_workers == 0 {
                condvar.notify_all();
            }
        });
        true
    }

    /// How many jobs are currently queued or running?
    pub fn active_workers(&self) -> u32 {
        self.state.0.lock().active_workers
    }

    /// Prevent further work from being spawned,
    /// and wait until all workers are done,
    /// or a timeout of roughly one second has been reached.
    pub fn exit(&self) {
        let (lock, condvar) = &*self.state;
        let mut state = lock.lock();
        state.active = false;
        if state.active_workers > 0 {
            let _ = condvar.wait_while_for(
                &mut state,
                |state| state.active_workers > 0,
                Duration::from_secs(1),
            );
        }
        if state.active_workers > 0 {
            debug!(
                "Exiting ThreadPool with {:?} still working(should be zero)",
                state.active_workers
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crossbeam_channel::unbounded;

    use super::*;

    #[test]
    fn workers_are_io_threads() {
        let pool = ThreadPool::new(2, "TestPool".to_owned());
        let (sender, receiver) = unbounded();
        assert!(pool.spawn(move || {
            let _ = sender.send(thread_state::get());
        }));
        let state = receiver.recv().unwrap();
        assert!(state.is_io_worker());
        assert!(!state.is_main());
    }

    #[test]
    fn exit_waits_and_rejects_new_work() {
        let pool = ThreadPool::new(2, "TestPool".to_owned());
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let counter = counter.clone();
            pool.spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.exit();
        assert_eq!(counter.load(Ordering::SeqCst), 8);
        assert_eq!(pool.active_workers(), 0);
        assert!(!pool.spawn(|| {}));
    }
}
