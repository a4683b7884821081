//! Software timers: tick counter and delta-encoded wait list
//!
//! [`Timeout`] is always built since the HAL idle contract uses it; the
//! queue itself needs feature `timer`.
//!
//! Sleeping tasks are chained through their control blocks in wake order.
//! Each node stores ticks since the previous node, so a tick only touches
//! the head and no absolute deadline ever needs overflow-safe comparison.
//!
//! ```text
//! sleep(A, 3), sleep(B, 5), sleep(C, 5)
//! head -> A(3) -> B(2) -> C(0)
//! ```
//!
//! Author: Moroya Sakamoto

use crate::config::{Ticks, SLEEP_NO_TIMEOUT};
#[cfg(feature = "timer")]
use crate::prio::bit;
#[cfg(feature = "timer")]
use crate::task::{TaskId, Tcb};

/// Idle sleep bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wake after this many ticks at the latest
    After(Ticks),
    /// No sleeping task; wait for any interrupt
    Never,
}

impl Timeout {
    /// Raw HAL encoding (`SLEEP_NO_TIMEOUT` for `Never`)
    pub const fn as_raw(self) -> Ticks {
        match self {
            Timeout::After(ticks) => ticks,
            Timeout::Never => SLEEP_NO_TIMEOUT,
        }
    }

    /// Decode a raw HAL value
    pub const fn from_raw(raw: Ticks) -> Self {
        if raw == SLEEP_NO_TIMEOUT {
            Timeout::Never
        } else {
            Timeout::After(raw)
        }
    }
}

/// Tick counter plus the head of the sleeping-task chain
///
/// The chain itself lives in the control blocks (`sleep_delta`,
/// `sleep_next`), so every method takes the block table.
#[cfg(feature = "timer")]
#[derive(Debug, Clone, Copy)]
pub struct TimerQueue {
    /// Free-running tick count (diagnostics only, wraps)
    ticks: Ticks,
    /// First task to wake
    head: Option<TaskId>,
}

#[cfg(feature = "timer")]
impl TimerQueue {
    /// Empty queue at tick zero
    pub const fn new() -> Self {
        Self { ticks: 0, head: None }
    }

    /// Drop every sleeper and restart the count
    pub fn reset(&mut self) {
        self.ticks = 0;
        self.head = None;
    }

    /// Ticks since init (wrapping)
    pub fn now(&self) -> Ticks {
        self.ticks
    }

    /// First task to wake
    pub fn head(&self) -> Option<TaskId> {
        self.head
    }

    /// Is no task sleeping?
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Link `id` to wake after `ticks` (> 0)
    ///
    /// Walks past every node due at or before the new deadline, so tasks
    /// sharing a deadline wake in the order they went to sleep.
    pub fn insert<const N: usize>(&mut self, tcbs: &mut [Tcb<N>], id: TaskId, ticks: Ticks) {
        let mut remaining = ticks;
        let mut prev: Option<TaskId> = None;
        let mut cur = self.head;

        while let Some(node) = cur {
            let delta = tcbs[node.index()].sleep_delta;
            if delta > remaining {
                break;
            }
            remaining -= delta;
            prev = Some(node);
            cur = tcbs[node.index()].sleep_next;
        }

        if let Some(next) = cur {
            tcbs[next.index()].sleep_delta -= remaining;
        }
        let tcb = &mut tcbs[id.index()];
        tcb.sleep_delta = remaining;
        tcb.sleep_next = cur;

        match prev {
            Some(p) => tcbs[p.index()].sleep_next = Some(id),
            None => self.head = Some(id),
        }
    }

    /// Unlink `id`, handing its delta to the successor
    ///
    /// Returns false if `id` was not linked.
    pub fn remove<const N: usize>(&mut self, tcbs: &mut [Tcb<N>], id: TaskId) -> bool {
        let mut prev: Option<TaskId> = None;
        let mut cur = self.head;

        while let Some(node) = cur {
            if node == id {
                let (delta, next) = (tcbs[node.index()].sleep_delta, tcbs[node.index()].sleep_next);
                if let Some(n) = next {
                    tcbs[n.index()].sleep_delta += delta;
                }
                match prev {
                    Some(p) => tcbs[p.index()].sleep_next = next,
                    None => self.head = next,
                }
                let tcb = &mut tcbs[id.index()];
                tcb.sleep_next = None;
                tcb.sleep_delta = 0;
                return true;
            }
            prev = Some(node);
            cur = tcbs[node.index()].sleep_next;
        }
        false
    }

    /// Advance one tick; returns the ready-word bits of every expired task
    ///
    /// Expired tasks are unlinked here; making them Ready is the caller's job.
    pub fn tick<const N: usize>(&mut self, tcbs: &mut [Tcb<N>]) -> u16 {
        self.ticks = self.ticks.wrapping_add(1);

        let Some(first) = self.head else {
            return 0;
        };
        let head = &mut tcbs[first.index()];
        head.sleep_delta = head.sleep_delta.saturating_sub(1);

        let mut expired = 0u16;
        while let Some(node) = self.head {
            let tcb = &mut tcbs[node.index()];
            if tcb.sleep_delta != 0 {
                break;
            }
            self.head = tcb.sleep_next;
            tcb.sleep_next = None;
            expired |= bit(node.0);
        }
        expired
    }

    /// Ticks until the next wake, `Never` when nobody sleeps
    pub fn next_deadline<const N: usize>(&self, tcbs: &[Tcb<N>]) -> Timeout {
        match self.head {
            Some(id) => Timeout::After(tcbs[id.index()].sleep_delta),
            None => Timeout::Never,
        }
    }

    /// Absolute ticks until `id` wakes (sum of deltas up to it)
    pub fn remaining<const N: usize>(&self, tcbs: &[Tcb<N>], id: TaskId) -> Option<Ticks> {
        let mut total: Ticks = 0;
        let mut cur = self.head;
        while let Some(node) = cur {
            total += tcbs[node.index()].sleep_delta;
            if node == id {
                return Some(total);
            }
            cur = tcbs[node.index()].sleep_next;
        }
        None
    }
}

#[cfg(feature = "timer")]
impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}
