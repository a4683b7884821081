//! MSS: MCU Simple Scheduler
//!
//! Fixed-priority, run-to-completion task scheduler for small MCUs:
//! - Up to 16 statically configured tasks, task id = priority
//! - Ready set is one 16-bit word, next task = lowest set bit
//! - Tasks are plain functions: no stacks, no context switch
//! - Software timers with a delta-encoded wait list (`timer`)
//! - Idle path sleeps in the HAL until the next wake deadline
//! - Optional reschedule request on higher-priority wake-ups (`preempt`)
//!
//! Author: Moroya Sakamoto

#![cfg_attr(not(test), no_std)]

#[doc(hidden)]
pub use log as __log;

#[macro_use]
mod check;

pub mod config;
pub mod error;
pub mod prio;
pub mod ready;
pub mod task;
pub mod timer;
pub mod scheduler;
pub mod hal;
pub mod kernel;
#[cfg(feature = "event")]
pub mod event;

pub use config::{Ticks, MAX_TASKS, SLEEP_NO_TIMEOUT};
pub use error::{Error, Result};
pub use task::{TaskEntry, TaskFn, TaskId, TaskState, Tcb};
pub use timer::Timeout;
pub use scheduler::{SchedStats, Scheduler};
pub use hal::{Hal, WaitForInterrupt};
pub use kernel::{Kernel, Pass};
#[cfg(feature = "event")]
pub use event::Event;
