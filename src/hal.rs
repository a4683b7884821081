//! Hardware abstraction boundary
//!
//! The kernel never touches a peripheral. The platform supplies CPU setup,
//! the low-power wait, and (with `preempt`) a way to re-enter the scheduler
//! soon, typically a pended software interrupt.
//!
//! The periodic tick is the other half of the contract: the platform's timer
//! interrupt calls [`crate::Kernel::tick`] at a fixed rate.
//!
//! Author: Moroya Sakamoto

use crate::timer::Timeout;

/// Platform collaborator
pub trait Hal {
    /// One-time platform setup (clocks, tick source, reschedule interrupt).
    /// Interrupts stay disabled.
    fn init(&self);

    /// Wait until [`Hal::wake`] is called, an interrupt arrives, or
    /// `timeout` ticks pass. Called outside the kernel's critical section.
    ///
    /// A `wake` that lands before the wait starts must make it return at
    /// once (sticky, like an event register). Returning early is harmless:
    /// the scheduler re-reads the ready word.
    fn sleep(&self, timeout: Timeout);

    /// A task became Ready while nothing runs: end the current or next
    /// [`Hal::sleep`]. Callable from any context, including interrupts and
    /// inside a critical section.
    fn wake(&self);

    /// Make the scheduler run again as soon as possible (feature `preempt`)
    ///
    /// Only requested while a task runs. Tasks are never interrupted, so a
    /// scheduling pass entered from the reschedule interrupt returns
    /// [`crate::Pass::Busy`]; the ready task runs right after the current
    /// one returns.
    fn trigger_reschedule(&self) {}
}

/// Generic HAL: `wfe`/`sev` on ARM, `wfi` on RISC-V, a spin hint elsewhere
///
/// Suitable when the tick and reschedule interrupts are wired up outside
/// the kernel. On ARM the event register keeps an early `wake`; on RISC-V
/// a wake between the ready check and `wfi` waits for the next interrupt
/// (the tick, when a sleeper exists).
#[derive(Debug, Default, Clone, Copy)]
pub struct WaitForInterrupt;

impl Hal for WaitForInterrupt {
    fn init(&self) {}

    fn sleep(&self, timeout: Timeout) {
        log::trace!("idle, timeout {:?}", timeout);
        cfg_if::cfg_if! {
            if #[cfg(all(target_os = "none", target_arch = "arm"))] {
                // SAFETY: `wfe` only halts the core until an event or interrupt.
                unsafe { core::arch::asm!("wfe", options(nomem, nostack)) };
            } else if #[cfg(all(target_os = "none", any(target_arch = "riscv32", target_arch = "riscv64")))] {
                // SAFETY: `wfi` only halts the core until the next interrupt.
                unsafe { core::arch::asm!("wfi", options(nomem, nostack)) };
            } else {
                core::hint::spin_loop();
            }
        }
    }

    fn wake(&self) {
        cfg_if::cfg_if! {
            if #[cfg(all(target_os = "none", target_arch = "arm"))] {
                // SAFETY: `sev` only sets the event register.
                unsafe { core::arch::asm!("sev", options(nomem, nostack)) };
            }
        }
    }
}
