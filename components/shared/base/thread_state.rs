/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Supports dynamic checks about what sort of thread is running.
//!
//! Threads that never call [`initialize`] report an empty state: they are
//! neither the main thread of a blob endpoint nor a stream transport worker.

use std::cell::Cell;

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct ThreadState: u32 {
        /// The thread owning actors and performing every protocol send.
        const MAIN = 0x01;
        /// A stream transport pool thread doing blocking I/O.
        const IO_WORKER = 0x02;
    }
}

impl ThreadState {
    pub fn is_main(self) -> bool {
        self.contains(ThreadState::MAIN)
    }

    pub fn is_io_worker(self) -> bool {
        self.contains(ThreadState::IO_WORKER)
    }
}

thread_local!(static STATE: Cell<Option<ThreadState>> = const { Cell::new(None) });

/// Record the role of the current thread. Must be called at most once per
/// thread.
pub fn initialize(x: ThreadState) {
    STATE.with(|state| {
        if let Some(previous) = state.get() {
            panic!("Thread state already initialized as {:?}", previous);
        }
        state.set(Some(x));
    });
}

pub fn get() -> ThreadState {
    STATE.with(|state| state.get().unwrap_or(ThreadState::empty()))
}

#[inline]
pub fn is_main_thread() -> bool {
    get().is_main()
}
