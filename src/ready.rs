//! Ready-set engine
//!
//! One 16-bit word, bit `i` set while task `i` is Ready. Selection never
//! caches: every pass reads the live word.
//!
//! Author: Moroya Sakamoto

use crate::prio::{bit, highest_priority_ready};
use crate::task::TaskId;

/// Ready bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadySet(u16);

impl ReadySet {
    /// Empty ready set
    pub const fn new() -> Self {
        Self(0)
    }

    /// Set the task's bit (idempotent)
    ///
    /// Callers validate `id` against the configured slot count.
    #[inline]
    pub fn mark_ready(&mut self, id: TaskId) {
        self.0 |= bit(id.0);
    }

    /// Clear the task's bit
    #[inline]
    pub fn clear(&mut self, id: TaskId) {
        self.0 &= !bit(id.0);
    }

    /// Is the task's bit set?
    #[inline]
    pub fn contains(&self, id: TaskId) -> bool {
        self.0 & bit(id.0) != 0
    }

    /// Smallest ready id, if any
    #[inline]
    pub fn highest(&self) -> Option<TaskId> {
        highest_priority_ready(self.0)
    }

    /// Any task with a smaller id than `id` ready?
    #[inline]
    pub fn has_higher_than(&self, id: TaskId) -> bool {
        self.0 & (bit(id.0) - 1) != 0
    }

    /// Raw ready word
    #[inline]
    pub fn bits(&self) -> u16 {
        self.0
    }

    /// Is nothing ready?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Clear every bit
    pub fn reset(&mut self) {
        self.0 = 0;
    }
}
