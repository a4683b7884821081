//! Fixed-priority run-to-completion scheduler state
//!
//! Control-block registry, ready word and timer queue in one owned value.
//! Nothing in here locks: [`crate::Kernel`] wraps it in a critical section
//! and drives dispatch. Kept lock-free so the state machine can be tested
//! on a host without interrupts.
//!
//! ```text
//!            activate                dispatch
//! Suspended ----------> Ready ----------------> Running
//!     ^                 ^  ^                      |  |
//!     |                 |  +---- reactivate ------+  |
//!     +-----------------|--------- return -----------+
//!                       |                            |
//!                       +---- tick expiry ---- Sleeping <-- sleep(n)
//! ```
//!
//! Author: Moroya Sakamoto

use crate::config::{SlotCount, MAX_TASKS};
#[cfg(feature = "timer")]
use crate::config::{Ticks, SLEEP_NO_TIMEOUT};
#[cfg(feature = "timer")]
use crate::error::{Error, Result};
#[cfg(feature = "timer")]
use crate::prio::bit;
use crate::prio::highest_priority_ready;
use crate::ready::ReadySet;
use crate::task::{TaskEntry, TaskId, TaskState, Tcb};
#[cfg(feature = "timer")]
use crate::timer::{Timeout, TimerQueue};

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedStats {
    /// Entry functions invoked
    pub dispatches: u32,
    /// Passes that found nothing ready
    pub idle_entries: u32,
    /// Timer ticks processed
    pub ticks: u32,
    /// Tasks made Ready by timer expiry
    pub timer_activations: u32,
}

/// Scheduler state for `N` task slots
pub struct Scheduler<const N: usize = MAX_TASKS> {
    /// One control block per slot, index == id == priority
    tcbs: [Tcb<N>; N],
    /// Ready word
    ready: ReadySet,
    /// Task whose entry function is executing
    running: Option<TaskId>,
    /// Sleeping tasks
    #[cfg(feature = "timer")]
    timer: TimerQueue,
    /// A task became Ready since the last `take_woken`
    woken: bool,
    /// Counters
    stats: SchedStats,
}

impl<const N: usize> Scheduler<N> {
    /// Build the registry from the static task table, every task Suspended
    pub const fn new(entries: [TaskEntry<N>; N]) -> Self {
        let () = SlotCount::<N>::OK;

        let mut tcbs = [Tcb::new(TaskId(0), entries[0]); N];
        let mut i = 0;
        while i < N {
            tcbs[i] = Tcb::new(TaskId(i as u8), entries[i]);
            i += 1;
        }

        Self {
            tcbs,
            ready: ReadySet::new(),
            running: None,
            #[cfg(feature = "timer")]
            timer: TimerQueue::new(),
            woken: false,
            stats: SchedStats {
                dispatches: 0,
                idle_entries: 0,
                ticks: 0,
                timer_activations: 0,
            },
        }
    }

    /// Back to the post-init state: nothing ready, nothing sleeping
    pub fn reset(&mut self) {
        for tcb in self.tcbs.iter_mut() {
            tcb.reset();
        }
        self.ready.reset();
        self.running = None;
        #[cfg(feature = "timer")]
        self.timer.reset();
        self.woken = false;
        self.stats = SchedStats::default();
    }

    /// Is `id` one of the configured slots?
    #[inline]
    pub fn is_valid(&self, id: TaskId) -> bool {
        id.index() < N
    }

    /// Make a task Ready
    ///
    /// Suspended or Sleeping tasks become Ready (sleepers are unlinked from
    /// the wait list first). Ready tasks are untouched. The running task
    /// is flagged to stay Ready when it returns.
    pub fn activate(&mut self, id: TaskId) {
        mss_check!(self.is_valid(id), "activate: task {} of {}", id, N);
        if !self.is_valid(id) {
            return;
        }

        match self.tcbs[id.index()].state {
            TaskState::Ready => {}
            TaskState::Running => {
                self.tcbs[id.index()].reactivate = true;
            }
            TaskState::Sleeping => {
                #[cfg(feature = "timer")]
                self.timer.remove(&mut self.tcbs, id);
                self.make_ready(id);
            }
            TaskState::Suspended => self.make_ready(id),
        }
        log::debug!("activate task {} -> ready {:#06x}", id, self.ready.bits());
    }

    fn make_ready(&mut self, id: TaskId) {
        self.tcbs[id.index()].state = TaskState::Ready;
        self.ready.mark_ready(id);
        self.woken = true;
    }

    /// Did any task become Ready since the last call? Clears the flag.
    pub fn take_woken(&mut self) -> bool {
        core::mem::replace(&mut self.woken, false)
    }

    /// Ask for the running task to stay Ready after it returns
    pub fn reactivate_running(&mut self) {
        mss_check!(self.running.is_some(), "reactivate outside a task");
        if let Some(id) = self.running {
            self.tcbs[id.index()].reactivate = true;
        }
    }

    /// Smallest ready id
    #[inline]
    pub fn highest_ready(&self) -> Option<TaskId> {
        highest_priority_ready(self.ready.bits())
    }

    /// Would a ready task outrank the one currently running?
    pub fn preempts_running(&self) -> bool {
        match self.running {
            Some(id) => self.ready.has_higher_than(id),
            None => false,
        }
    }

    /// First half of dispatch: mark `id` Running, clear its ready bit, hand
    /// back its entry for the caller to invoke
    pub fn begin_dispatch(&mut self, id: TaskId) -> TaskEntry<N> {
        mss_check!(self.is_valid(id), "dispatch: task {} of {}", id, N);
        mss_check!(self.running.is_none(), "dispatch {} while {:?} runs", id, self.running);
        mss_check!(self.tcbs[id.index()].is_ready(), "dispatch of non-ready task {}", id);

        let tcb = &mut self.tcbs[id.index()];
        tcb.state = TaskState::Running;
        self.ready.clear(id);
        self.running = Some(id);
        self.stats.dispatches = self.stats.dispatches.wrapping_add(1);
        log::trace!("dispatch task {}", id);
        tcb.entry
    }

    /// Second half of dispatch, after the entry function returned
    ///
    /// A task that put itself to sleep stays Sleeping. Otherwise it goes
    /// back to Ready if it asked to, else to Suspended. The flag is
    /// consumed either way.
    pub fn finish_dispatch(&mut self, id: TaskId) {
        mss_check!(self.running == Some(id), "finish {} but {:?} runs", id, self.running);
        self.running = None;

        let tcb = &mut self.tcbs[id.index()];
        let reactivate = core::mem::replace(&mut tcb.reactivate, false);
        if tcb.state != TaskState::Running {
            return;
        }
        if reactivate {
            self.make_ready(id);
        } else {
            self.tcbs[id.index()].state = TaskState::Suspended;
        }
    }

    /// Record a pass that found nothing to run
    pub fn note_idle(&mut self) {
        self.stats.idle_entries = self.stats.idle_entries.wrapping_add(1);
    }

    /// Put a task to sleep for `ticks` timer ticks
    ///
    /// `ticks == 0` activates immediately. A sleeping task is re-linked with
    /// the new timeout. `SLEEP_NO_TIMEOUT` is refused: it only means
    /// "no deadline" to the idle path.
    #[cfg(feature = "timer")]
    pub fn sleep(&mut self, id: TaskId, ticks: Ticks) -> Result<()> {
        mss_check!(self.is_valid(id), "sleep: task {} of {}", id, N);
        if !self.is_valid(id) {
            return Err(Error::InvalidTask(id));
        }
        if ticks == SLEEP_NO_TIMEOUT {
            return Err(Error::ReservedTimeout);
        }
        if ticks == 0 {
            self.activate(id);
            return Ok(());
        }

        match self.tcbs[id.index()].state {
            TaskState::Sleeping => {
                self.timer.remove(&mut self.tcbs, id);
            }
            TaskState::Running => self.tcbs[id.index()].reactivate = false,
            TaskState::Ready | TaskState::Suspended => {}
        }
        self.ready.clear(id);
        self.tcbs[id.index()].state = TaskState::Sleeping;
        self.timer.insert(&mut self.tcbs, id, ticks);
        log::debug!("task {} sleeps {} ticks", id, ticks);
        Ok(())
    }

    /// Advance the timer one tick, waking every task whose delay ran out
    ///
    /// Returns true if at least one task became Ready.
    #[cfg(feature = "timer")]
    pub fn tick(&mut self) -> bool {
        self.stats.ticks = self.stats.ticks.wrapping_add(1);
        let mut expired = self.timer.tick(&mut self.tcbs);
        let activated = expired != 0;

        while let Some(id) = highest_priority_ready(expired) {
            expired &= !bit(id.0);
            self.make_ready(id);
            self.stats.timer_activations = self.stats.timer_activations.wrapping_add(1);
            log::trace!("tick {}: task {} wakes", self.timer.now(), id);
        }
        activated
    }

    /// Ticks until the next sleeper wakes, `Timeout::Never` if none sleeps
    #[cfg(feature = "timer")]
    pub fn next_deadline(&self) -> Timeout {
        self.timer.next_deadline(&self.tcbs)
    }

    /// Ticks left before `id` wakes, if it sleeps
    #[cfg(feature = "timer")]
    pub fn remaining_ticks(&self, id: TaskId) -> Option<Ticks> {
        if !self.is_valid(id) {
            return None;
        }
        self.timer.remaining(&self.tcbs, id)
    }

    /// Tick counter
    #[cfg(feature = "timer")]
    pub fn now(&self) -> Ticks {
        self.timer.now()
    }

    /// State of `id`
    pub fn state(&self, id: TaskId) -> TaskState {
        mss_check!(self.is_valid(id), "state: task {} of {}", id, N);
        self.tcbs[id.index()].state
    }

    /// Control block of `id`
    pub fn tcb(&self, id: TaskId) -> Option<&Tcb<N>> {
        self.tcbs.get(id.index())
    }

    /// Task whose entry function is executing
    pub fn running(&self) -> Option<TaskId> {
        self.running
    }

    /// Raw ready word
    pub fn ready_bits(&self) -> u16 {
        self.ready.bits()
    }

    /// Counters
    pub fn stats(&self) -> SchedStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Kernel;

    fn dummy_task(_kernel: &Kernel<4>, _arg: usize) {}

    fn sched() -> Scheduler<4> {
        Scheduler::new([TaskEntry::new(dummy_task, 0); 4])
    }

    /// Run the highest ready task through both dispatch halves
    fn run_one(s: &mut Scheduler<4>) -> Option<TaskId> {
        let id = s.highest_ready()?;
        s.begin_dispatch(id);
        s.finish_dispatch(id);
        Some(id)
    }

    fn assert_bits_match_states(s: &Scheduler<4>) {
        for i in 0..4u8 {
            let id = TaskId(i);
            assert_eq!(s.ready.contains(id), s.state(id) == TaskState::Ready, "task {i}");
        }
    }

    #[test]
    fn test_scheduler_empty() {
        let s = sched();
        assert_eq!(s.ready_bits(), 0);
        assert_eq!(s.highest_ready(), None);
        assert_eq!(s.running(), None);
        for i in 0..4 {
            assert_eq!(s.state(TaskId(i)), TaskState::Suspended);
        }
    }

    #[test]
    fn test_activate_idempotent() {
        let mut s = sched();
        s.activate(TaskId(2));
        s.activate(TaskId(2));
        assert_eq!(s.ready_bits(), 0b0100);
        assert_eq!(s.state(TaskId(2)), TaskState::Ready);
        assert_eq!(run_one(&mut s), Some(TaskId(2)));
        assert_eq!(run_one(&mut s), None);
    }

    #[test]
    fn test_priority_order() {
        let mut s = sched();
        s.activate(TaskId(2));
        s.activate(TaskId(0));
        s.activate(TaskId(1));
        assert_eq!(run_one(&mut s), Some(TaskId(0)));
        assert_eq!(run_one(&mut s), Some(TaskId(1)));
        assert_eq!(run_one(&mut s), Some(TaskId(2)));
        assert_eq!(run_one(&mut s), None);
        assert_eq!(s.stats().dispatches, 3);
    }

    #[test]
    fn test_dispatch_states() {
        let mut s = sched();
        s.activate(TaskId(1));
        let entry = s.begin_dispatch(TaskId(1));
        assert_eq!(entry.arg, 0);
        assert_eq!(s.state(TaskId(1)), TaskState::Running);
        assert_eq!(s.running(), Some(TaskId(1)));
        assert_eq!(s.ready_bits(), 0);

        s.finish_dispatch(TaskId(1));
        assert_eq!(s.state(TaskId(1)), TaskState::Suspended);
        assert_eq!(s.running(), None);
        assert_bits_match_states(&s);
    }

    #[test]
    fn test_reactivate_keeps_ready() {
        let mut s = sched();
        s.activate(TaskId(3));
        for _ in 0..100 {
            let id = s.highest_ready().unwrap();
            s.begin_dispatch(id);
            s.reactivate_running();
            s.finish_dispatch(id);
            assert_eq!(s.state(TaskId(3)), TaskState::Ready);
            assert!(!s.tcb(TaskId(3)).unwrap().reactivate);
        }
    }

    #[test]
    fn test_activate_running_means_reactivate() {
        let mut s = sched();
        s.activate(TaskId(0));
        s.begin_dispatch(TaskId(0));
        s.activate(TaskId(0));
        assert_eq!(s.ready_bits(), 0);
        s.finish_dispatch(TaskId(0));
        assert_eq!(s.state(TaskId(0)), TaskState::Ready);
        assert_bits_match_states(&s);
    }

    #[test]
    fn test_activation_during_run() {
        let mut s = sched();
        s.activate(TaskId(0));
        s.begin_dispatch(TaskId(0));
        s.activate(TaskId(1));
        s.finish_dispatch(TaskId(0));
        assert_eq!(s.state(TaskId(0)), TaskState::Suspended);
        assert_eq!(s.highest_ready(), Some(TaskId(1)));
    }

    #[test]
    fn test_preempts_running() {
        let mut s = sched();
        s.activate(TaskId(2));
        assert!(!s.preempts_running());
        s.begin_dispatch(TaskId(2));
        s.activate(TaskId(3));
        assert!(!s.preempts_running());
        s.activate(TaskId(1));
        assert!(s.preempts_running());
        s.finish_dispatch(TaskId(2));
        assert!(!s.preempts_running());
    }

    #[test]
    fn test_take_woken() {
        let mut s = sched();
        assert!(!s.take_woken());
        s.activate(TaskId(1));
        assert!(s.take_woken());
        assert!(!s.take_woken());
        s.activate(TaskId(1));
        assert!(!s.take_woken());
        s.begin_dispatch(TaskId(1));
        s.finish_dispatch(TaskId(1));
        assert!(!s.take_woken());
        s.reset();
        assert!(!s.take_woken());
    }

    #[test]
    #[should_panic(expected = "mss check failed")]
    #[cfg(feature = "debug-check")]
    fn test_invalid_activate_halts() {
        let mut s = sched();
        s.activate(TaskId(4));
    }

    #[test]
    #[should_panic(expected = "mss check failed")]
    #[cfg(feature = "debug-check")]
    fn test_nested_dispatch_halts() {
        let mut s = sched();
        s.activate(TaskId(0));
        s.activate(TaskId(1));
        s.begin_dispatch(TaskId(0));
        s.begin_dispatch(TaskId(1));
    }

    #[test]
    #[should_panic(expected = "mss check failed")]
    #[cfg(feature = "debug-check")]
    fn test_reactivate_outside_task_halts() {
        let mut s = sched();
        s.reactivate_running();
    }

    #[test]
    fn test_reset() {
        let mut s = sched();
        s.activate(TaskId(0));
        s.activate(TaskId(3));
        s.reset();
        assert_eq!(s.ready_bits(), 0);
        assert_eq!(s.stats(), SchedStats::default());
        assert_eq!(s.state(TaskId(3)), TaskState::Suspended);
    }

    #[cfg(feature = "timer")]
    mod timer {
        use super::*;

        #[test]
        fn test_sleep_wakes_on_nth_tick() {
            let mut s = sched();
            s.activate(TaskId(2));
            s.sleep(TaskId(2), 5).unwrap();
            assert_eq!(s.ready_bits(), 0);
            assert_eq!(s.state(TaskId(2)), TaskState::Sleeping);
            s.take_woken();

            for n in 1..5 {
                assert!(!s.tick(), "tick {n}");
                assert_eq!(s.state(TaskId(2)), TaskState::Sleeping);
            }
            assert_eq!(s.remaining_ticks(TaskId(2)), Some(1));
            assert_eq!(s.next_deadline(), Timeout::After(1));

            assert!(!s.take_woken());
            assert!(s.tick());
            assert!(s.take_woken());
            assert_eq!(s.state(TaskId(2)), TaskState::Ready);
            assert_eq!(s.ready_bits(), 0b0100);
            assert_eq!(s.next_deadline(), Timeout::Never);
            assert_eq!(s.stats().timer_activations, 1);
            assert_eq!(s.now(), 5);
        }

        #[test]
        fn test_next_deadline_iff_sleeping() {
            let mut s = sched();
            assert_eq!(s.next_deadline(), Timeout::Never);
            s.sleep(TaskId(1), 7).unwrap();
            s.sleep(TaskId(3), 4).unwrap();
            assert_eq!(s.next_deadline(), Timeout::After(4));
            s.activate(TaskId(3));
            assert_eq!(s.next_deadline(), Timeout::After(7));
            s.activate(TaskId(1));
            assert_eq!(s.next_deadline(), Timeout::Never);
            assert_bits_match_states(&s);
        }

        #[test]
        fn test_sleep_reserved_timeout_rejected() {
            let mut s = sched();
            s.activate(TaskId(0));
            assert_eq!(s.sleep(TaskId(0), SLEEP_NO_TIMEOUT), Err(Error::ReservedTimeout));
            assert_eq!(s.state(TaskId(0)), TaskState::Ready);
            assert_eq!(s.next_deadline(), Timeout::Never);
        }

        #[test]
        fn test_sleep_zero_activates() {
            let mut s = sched();
            s.sleep(TaskId(1), 0).unwrap();
            assert_eq!(s.state(TaskId(1)), TaskState::Ready);
            assert_eq!(s.next_deadline(), Timeout::Never);
        }

        #[test]
        fn test_resleep_relinks() {
            let mut s = sched();
            s.sleep(TaskId(0), 3).unwrap();
            s.sleep(TaskId(0), 10).unwrap();
            assert_eq!(s.remaining_ticks(TaskId(0)), Some(10));
            for _ in 0..9 {
                assert!(!s.tick());
            }
            assert!(s.tick());
        }

        #[test]
        fn test_running_task_sleeps_itself() {
            let mut s = sched();
            s.activate(TaskId(1));
            s.begin_dispatch(TaskId(1));
            s.reactivate_running();
            s.sleep(TaskId(1), 2).unwrap();
            s.finish_dispatch(TaskId(1));
            assert_eq!(s.state(TaskId(1)), TaskState::Sleeping);
            assert_eq!(s.ready_bits(), 0);
            assert!(!s.tick());
            assert!(s.tick());
            assert_eq!(run_one(&mut s), Some(TaskId(1)));
        }

        #[test]
        fn test_same_tick_wakes_by_priority() {
            let mut s = sched();
            s.sleep(TaskId(3), 2).unwrap();
            s.sleep(TaskId(1), 2).unwrap();
            s.tick();
            assert!(s.tick());
            assert_eq!(run_one(&mut s), Some(TaskId(1)));
            assert_eq!(run_one(&mut s), Some(TaskId(3)));
        }

        #[test]
        fn test_invalid_sleep_rejected() {
            let mut s = sched();
            let result = std::panic::catch_unwind(move || s.sleep(TaskId(9), 1));
            match result {
                Ok(r) => assert_eq!(r, Err(Error::InvalidTask(TaskId(9)))),
                Err(_) => assert!(cfg!(feature = "debug-check")),
            }
        }
    }
}
