//! Compile-time configuration
//!
//! Everything that the scheduler sizes or encodes at build time. Feature
//! switches live in `Cargo.toml`; the numbers live here.
//!
//! Author: Moroya Sakamoto

/// Maximum task slots (one bit each in the 16-bit ready word)
pub const MAX_TASKS: usize = 16;

/// Timer tick counter type
pub type Ticks = u32;

/// Raw "sleep without timeout" value handed to the HAL
///
/// Reserved: never a valid task sleep duration.
pub const SLEEP_NO_TIMEOUT: Ticks = Ticks::MAX;

/// Raw "no task" id (e.g. nothing running, empty ready word)
pub const INVALID_TASK_ID: u8 = 0xFF;

/// Compile-time slot count check, evaluated per `N` on first use
pub(crate) struct SlotCount<const N: usize>;

impl<const N: usize> SlotCount<N> {
    pub(crate) const OK: () = assert!(N >= 1 && N <= MAX_TASKS, "task slot count must be 1..=16");
}
