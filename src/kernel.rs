//! Kernel: the scheduler loop behind one critical section
//!
//! Owns the scheduler state and the platform HAL. Every state change runs
//! inside `critical_section::with`, so the same kernel can be driven from
//! main context and from interrupt handlers (tick, events, reschedule).
//! Task entry functions and the idle wait run with the lock released, so
//! tasks may call back in and another context can activate a task while
//! the scheduler idles.
//!
//! Author: Moroya Sakamoto

use core::cell::RefCell;

use critical_section::Mutex;

use crate::config::MAX_TASKS;
#[cfg(feature = "timer")]
use crate::config::Ticks;
#[cfg(feature = "timer")]
use crate::error::Result;
use crate::hal::Hal;
use crate::scheduler::{SchedStats, Scheduler};
use crate::task::{TaskEntry, TaskId, TaskState};
use crate::timer::Timeout;

/// Outcome of one scheduling pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// This task ran to completion
    Dispatched(TaskId),
    /// Nothing was ready; the HAL slept with this bound
    Idle(Timeout),
    /// Entered while this task was still running; nothing done
    Busy(TaskId),
}

/// MSS kernel for `N` statically configured tasks
///
/// ```ignore
/// static HAL: WaitForInterrupt = WaitForInterrupt;
/// static KERNEL: Kernel<2> = Kernel::new(&HAL, [
///     TaskEntry::plain(blink),
///     TaskEntry::new(poll_uart, UART0_BASE),
/// ]);
///
/// KERNEL.init();
/// KERNEL.activate(TaskId(1));
/// KERNEL.run()
/// ```
pub struct Kernel<const N: usize = MAX_TASKS> {
    /// Platform collaborator
    hal: &'static (dyn Hal + Sync),
    /// Scheduler state, only touched inside a critical section
    sched: Mutex<RefCell<Scheduler<N>>>,
}

impl<const N: usize> Kernel<N> {
    /// Kernel over a fixed task table; slot `i` gets id and priority `i`
    pub const fn new(hal: &'static (dyn Hal + Sync), entries: [TaskEntry<N>; N]) -> Self {
        Self {
            hal,
            sched: Mutex::new(RefCell::new(Scheduler::new(entries))),
        }
    }

    /// Platform setup and a clean scheduler: every task Suspended
    pub fn init(&self) {
        self.hal.init();
        self.with(|s| s.reset());
        log::info!("mss kernel: {} task slots", N);
    }

    #[inline]
    fn with<R>(&self, f: impl FnOnce(&mut Scheduler<N>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.sched.borrow_ref_mut(cs)))
    }

    /// What a state change owes the HAL: `(wake the idle wait, reschedule)`
    ///
    /// Only tasks that newly became Ready count.
    fn wake_up(s: &mut Scheduler<N>) -> (bool, bool) {
        let woken = s.take_woken();
        (woken && s.running().is_none(), woken && s.preempts_running())
    }

    fn notify(&self, (wake, reschedule): (bool, bool)) {
        if wake {
            self.hal.wake();
        }
        self.request_reschedule(reschedule);
    }

    /// Pend a reschedule (feature `preempt`)
    ///
    /// The pass it triggers returns `Busy` while the current task runs; the
    /// higher-priority task is picked as soon as that task returns.
    fn request_reschedule(&self, needed: bool) {
        cfg_if::cfg_if! {
            if #[cfg(feature = "preempt")] {
                if needed {
                    log::debug!("higher-priority task ready, rescheduling");
                    self.hal.trigger_reschedule();
                }
            } else {
                let _ = needed;
            }
        }
    }

    /// Make a task Ready (safe from interrupt context)
    pub fn activate(&self, id: TaskId) {
        let pending = self.with(|s| {
            s.activate(id);
            Self::wake_up(s)
        });
        self.notify(pending);
    }

    /// Keep the running task Ready after it returns
    ///
    /// Only meaningful from inside a task's entry function.
    pub fn reactivate(&self) {
        self.with(|s| s.reactivate_running());
    }

    /// Put a task to sleep for `ticks` ticks
    ///
    /// `ticks` must not be `SLEEP_NO_TIMEOUT`; zero activates at once.
    #[cfg(feature = "timer")]
    pub fn sleep(&self, id: TaskId, ticks: Ticks) -> Result<()> {
        let pending = self.with(|s| s.sleep(id, ticks).map(|()| Self::wake_up(s)))?;
        self.notify(pending);
        Ok(())
    }

    /// Periodic tick, called from the timer interrupt
    ///
    /// Returns true if a sleeping task woke, meaning a scheduling pass is due.
    #[cfg(feature = "timer")]
    pub fn tick(&self) -> bool {
        let (activated, pending) = self.with(|s| {
            let activated = s.tick();
            (activated, Self::wake_up(s))
        });
        self.notify(pending);
        activated
    }

    /// Ticks until the next sleeper wakes
    #[cfg(feature = "timer")]
    pub fn next_deadline(&self) -> Timeout {
        self.with(|s| s.next_deadline())
    }

    /// Ticks left before `id` wakes, if it sleeps
    #[cfg(feature = "timer")]
    pub fn remaining_ticks(&self, id: TaskId) -> Option<Ticks> {
        self.with(|s| s.remaining_ticks(id))
    }

    /// Tick counter
    #[cfg(feature = "timer")]
    pub fn now(&self) -> Ticks {
        self.with(|s| s.now())
    }

    /// Run one Ready task to completion
    pub fn dispatch(&self, id: TaskId) {
        let entry = self.with(|s| s.begin_dispatch(id));
        self.invoke(id, entry);
    }

    fn invoke(&self, id: TaskId, entry: TaskEntry<N>) {
        (entry.func)(self, entry.arg);
        self.with(|s| s.finish_dispatch(id));
    }

    /// One pass of the scheduler loop
    ///
    /// Dispatches the highest-priority Ready task, or idles in the HAL until
    /// the next deadline, a wake or an interrupt. Re-entry while a task runs
    /// (e.g. from the reschedule interrupt) returns `Busy`: tasks are never
    /// interrupted mid-function, the running one finishes first.
    ///
    /// The idle wait runs outside the critical section. Any activation after
    /// the ready word was read calls [`Hal::wake`], which the HAL keeps until
    /// the wait starts.
    pub fn schedule(&self) -> Pass {
        let next = self.with(|s| {
            if let Some(running) = s.running() {
                return Err(Pass::Busy(running));
            }
            s.take_woken();
            match s.highest_ready() {
                Some(id) => Ok((id, s.begin_dispatch(id))),
                None => {
                    s.note_idle();
                    Err(Pass::Idle(Self::idle_timeout(s)))
                }
            }
        });

        match next {
            Ok((id, entry)) => {
                self.invoke(id, entry);
                Pass::Dispatched(id)
            }
            Err(Pass::Idle(timeout)) => {
                log::debug!("idle, timeout {:?}", timeout);
                self.hal.sleep(timeout);
                Pass::Idle(timeout)
            }
            Err(pass) => pass,
        }
    }

    #[cfg(feature = "timer")]
    fn idle_timeout(s: &Scheduler<N>) -> Timeout {
        s.next_deadline()
    }

    #[cfg(not(feature = "timer"))]
    fn idle_timeout(_s: &Scheduler<N>) -> Timeout {
        Timeout::Never
    }

    /// Scheduler loop, never returns
    pub fn run(&self) -> ! {
        loop {
            self.schedule();
        }
    }

    /// Task whose entry function is executing
    pub fn running_task(&self) -> Option<TaskId> {
        self.with(|s| s.running())
    }

    /// State of `id`
    pub fn state(&self, id: TaskId) -> TaskState {
        self.with(|s| s.state(id))
    }

    /// Raw ready word
    pub fn ready_bits(&self) -> u16 {
        self.with(|s| s.ready_bits())
    }

    /// Scheduler counters
    pub fn stats(&self) -> SchedStats {
        self.with(|s| s.stats())
    }
}
