//! Task control blocks: static, no-alloc, one per slot
//!
//! A task is a plain function that runs to completion and returns. No
//! stack of its own, no context switch. Its slot index is its priority.
//!
//! Author: Moroya Sakamoto

use core::fmt;

use crate::config::{Ticks, INVALID_TASK_ID, MAX_TASKS};
use crate::kernel::Kernel;

/// Task id, doubling as fixed priority (lower number = higher priority)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u8);

impl TaskId {
    /// Highest priority slot
    pub const HIGHEST: TaskId = TaskId(0);
    /// Lowest priority slot with a full table
    pub const LOWEST: TaskId = TaskId(MAX_TASKS as u8 - 1);

    /// Slot index
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw id, `INVALID_TASK_ID` for `None`
    pub const fn to_raw(id: Option<TaskId>) -> u8 {
        match id {
            Some(id) => id.0,
            None => INVALID_TASK_ID,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task entry point: the kernel it runs under plus its opaque argument
pub type TaskFn<const N: usize = MAX_TASKS> = fn(&Kernel<N>, usize);

/// Entry function bound to its argument
#[derive(Clone, Copy)]
pub struct TaskEntry<const N: usize = MAX_TASKS> {
    /// Function invoked on dispatch
    pub func: TaskFn<N>,
    /// Opaque argument passed at every dispatch
    pub arg: usize,
}

impl<const N: usize> TaskEntry<N> {
    /// Bind `func` to `arg`
    pub const fn new(func: TaskFn<N>, arg: usize) -> Self {
        Self { func, arg }
    }

    /// Entry with a zero argument
    pub const fn plain(func: TaskFn<N>) -> Self {
        Self { func, arg: 0 }
    }
}

impl<const N: usize> fmt::Debug for TaskEntry<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskEntry").field("arg", &self.arg).finish_non_exhaustive()
    }
}

/// Task execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not scheduled; waits for an activation
    Suspended,
    /// Ready bit set, waiting for the scheduler
    Ready,
    /// Entry function executing
    Running,
    /// Linked into the timer wait list
    Sleeping,
}

/// Task control block
#[derive(Debug, Clone, Copy)]
pub struct Tcb<const N: usize = MAX_TASKS> {
    id: TaskId,
    /// Entry function and argument
    pub entry: TaskEntry<N>,
    /// Current state
    pub state: TaskState,
    /// Stay Ready after the current run instead of suspending
    pub reactivate: bool,
    /// Ticks after the previous wait-list node (delta encoding)
    pub sleep_delta: Ticks,
    /// Next node in the wait list
    pub sleep_next: Option<TaskId>,
}

impl<const N: usize> Tcb<N> {
    /// Suspended control block for slot `id`
    pub const fn new(id: TaskId, entry: TaskEntry<N>) -> Self {
        Self {
            id,
            entry,
            state: TaskState::Suspended,
            reactivate: false,
            sleep_delta: 0,
            sleep_next: None,
        }
    }

    /// Slot id (immutable)
    #[inline]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Back to the post-init state, keeping id and entry
    pub fn reset(&mut self) {
        self.state = TaskState::Suspended;
        self.reactivate = false;
        self.sleep_delta = 0;
        self.sleep_next = None;
    }

    /// Is the task eligible for selection?
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == TaskState::Ready
    }
}
