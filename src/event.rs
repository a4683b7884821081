//! Event flags: wake waiting tasks from other tasks or interrupts
//!
//! Built only on the kernel's task API: `wait` registers the task and puts
//! it to sleep (finite timeout) or lets it suspend on return (`Never`);
//! `set` activates every registered waiter. A task that runs while still
//! registered was woken by its timeout, not by the event.
//!
//! Author: Moroya Sakamoto

use core::cell::Cell;

use critical_section::Mutex;

use crate::config::MAX_TASKS;
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::prio::{bit, highest_priority_ready};
use crate::task::TaskId;
use crate::timer::Timeout;

/// Event with a waiter bitmask (one bit per task, like the ready word)
pub struct Event {
    waiters: Mutex<Cell<u16>>,
}

impl Event {
    /// Event with no waiters
    pub const fn new() -> Self {
        Self { waiters: Mutex::new(Cell::new(0)) }
    }

    /// Register `id` as a waiter, sleeping up to `timeout` ticks
    ///
    /// Registration and sleep happen in one critical section, so a `set`
    /// from an interrupt cannot slip in between. On error nothing changes.
    /// A zero timeout only activates the task, it is never registered.
    pub fn wait<const N: usize>(&self, kernel: &Kernel<N>, id: TaskId, timeout: Timeout) -> Result<()> {
        mss_check!(id.index() < N, "event wait: task {} of {}", id, N);
        if id.index() >= N {
            return Err(Error::InvalidTask(id));
        }
        critical_section::with(|cs| {
            match timeout {
                Timeout::After(0) => return kernel.sleep(id, 0),
                Timeout::After(ticks) => kernel.sleep(id, ticks)?,
                Timeout::Never => {}
            }
            let waiters = self.waiters.borrow(cs);
            waiters.set(waiters.get() | bit(id.0));
            Ok(())
        })
    }

    /// Activate every waiter and clear the set; returns how many woke
    pub fn set<const N: usize>(&self, kernel: &Kernel<N>) -> u32 {
        critical_section::with(|cs| {
            let mut pending = self.waiters.borrow(cs).replace(0);
            let woken = pending.count_ones();
            while let Some(id) = highest_priority_ready(pending) {
                pending &= !bit(id.0);
                kernel.activate(id);
            }
            log::debug!("event set, {} waiter(s) woken", woken);
            woken
        })
    }

    /// Is `id` still registered (i.e. not woken by `set`)?
    pub fn is_waiting(&self, id: TaskId) -> bool {
        let Some(mask) = Self::mask(id) else {
            return false;
        };
        critical_section::with(|cs| self.waiters.borrow(cs).get() & mask != 0)
    }

    /// Drop `id` from the waiters; returns whether it was registered
    pub fn cancel(&self, id: TaskId) -> bool {
        let Some(mask) = Self::mask(id) else {
            return false;
        };
        critical_section::with(|cs| {
            let waiters = self.waiters.borrow(cs);
            let was = waiters.get() & mask != 0;
            waiters.set(waiters.get() & !mask);
            was
        })
    }

    /// Waiter bit of `id`; ids past the ready word have none
    fn mask(id: TaskId) -> Option<u16> {
        mss_check!(id.index() < MAX_TASKS, "event: task {} out of range", id);
        (id.index() < MAX_TASKS).then(|| bit(id.0))
    }

    /// Raw waiter mask
    pub fn waiters(&self) -> u16 {
        critical_section::with(|cs| self.waiters.borrow(cs).get())
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}
