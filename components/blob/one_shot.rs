/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A slot that is filled at most once and can be waited on.
//!
//! Remote streams wait on one for their backing stream, and the blob thread
//! uses one per synchronous request made from another thread.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

enum Slot<T> {
    Empty,
    Full(T),
    /// The producer went away without filling the slot.
    Abandoned,
}

pub struct OneShot<T> {
    slot: Mutex<Slot<T>>,
    condvar: Condvar,
}

impl<T> Default for OneShot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OneShot<T> {
    pub fn new() -> OneShot<T> {
        OneShot {
            slot: Mutex::new(Slot::Empty),
            condvar: Condvar::new(),
        }
    }

    /// Fill the slot and wake every waiter. Returns the value back if the
    /// slot was already filled or abandoned.
    pub fn fill(&self, value: T) -> Result<(), T> {
        let mut slot = self.slot.lock();
        if !matches!(*slot, Slot::Empty) {
            return Err(value);
        }
        *slot = Slot::Full(value);
        self.condvar.notify_all();
        Ok(())
    }

    /// Give up on the slot. Waiters wake up empty-handed.
    pub fn abandon(&self) {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Empty) {
            *slot = Slot::Abandoned;
            self.condvar.notify_all();
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(*self.slot.lock(), Slot::Empty)
    }

    /// Apply `f` to the value if the slot is filled, without waiting.
    pub fn try_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        match *self.slot.lock() {
            Slot::Full(ref value) => Some(f(value)),
            _ => None,
        }
    }

    /// Wait until the slot is settled, then apply `f` to the value. Returns
    /// `None` if the slot was abandoned.
    pub fn wait_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let mut slot = self.slot.lock();
        self.condvar
            .wait_while(&mut slot, |slot| matches!(slot, Slot::Empty));
        match *slot {
            Slot::Full(ref value) => Some(f(value)),
            _ => None,
        }
    }

    /// Wait until the slot is settled and move the value out.
    pub fn wait_take(&self) -> Option<T> {
        let mut slot = self.slot.lock();
        self.condvar
            .wait_while(&mut slot, |slot| matches!(slot, Slot::Empty));
        match std::mem::replace(&mut *slot, Slot::Abandoned) {
            Slot::Full(value) => Some(value),
            _ => None,
        }
    }
}

/// Fills a shared slot from another thread. Dropping it unfilled abandons
/// the slot, so a waiter never outlives the work it waits for.
pub struct Completer<T> {
    slot: Arc<OneShot<T>>,
}

impl<T> Completer<T> {
    pub fn new(slot: Arc<OneShot<T>>) -> Completer<T> {
        Completer { slot }
    }

    pub fn complete(self, value: T) {
        let _ = self.slot.fill(value);
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        self.slot.abandon();
    }
}
