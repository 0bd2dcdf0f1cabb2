//! Delayed, cancellable callbacks on a single serialized timeline.
//!
//! Everything in this crate runs on one thread: user calls, backend updates
//! and timer firings never overlap. The [`Scheduler`] trait is the only
//! source of time; production code plugs a runtime-backed implementation in,
//! tests use [`ManualScheduler`] and move its virtual clock by hand.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tracing::trace;

/// Identifies a scheduled callback so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Wrap a scheduler-specific timer identifier.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw identifier.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A callback run once when its timer expires.
pub type TimerTask = Box<dyn FnOnce() + 'static>;

/// A serialized timeline able to run callbacks after a delay.
///
/// Implementations must never run a task from inside `schedule` or `cancel`;
/// tasks only run when the timeline itself gets control back.
pub trait Scheduler {
    /// Time elapsed since the scheduler was created.
    fn now(&self) -> Duration;

    /// Run `task` once, `delay` from now.
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;

    /// Cancel a scheduled task. Returns false if it already ran or was
    /// cancelled before.
    fn cancel(&self, handle: TimerHandle) -> bool;
}

/// Virtual clock scheduler for tests and simulations.
///
/// Time only moves when [`ManualScheduler::advance`] is called; due tasks run
/// in deadline order, ties broken by scheduling order.
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    queue: RefCell<BTreeMap<(Duration, u64), TimerTask>>,
    deadlines: RefCell<HashMap<u64, Duration>>,
}

impl ManualScheduler {
    /// Create a scheduler whose clock starts at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward, running every task that falls due on the way.
    ///
    /// Tasks scheduled by a running task are honoured if their deadline is
    /// still within the advanced window. Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now.get() + by;
        let mut fired = 0;

        loop {
            // Pop under a short borrow so the task can schedule or cancel.
            let next = {
                let mut queue = self.queue.borrow_mut();
                let first = queue.keys().next().copied();
                match first {
                    Some(key) if key.0 <= target => queue.remove(&key).map(|task| (key, task)),
                    _ => None,
                }
            };

            let Some(((deadline, id), task)) = next else {
                break;
            };

            self.deadlines.borrow_mut().remove(&id);
            self.now.set(deadline);
            trace!(timer = id, at_ms = deadline.as_millis() as u64, "timer fired");
            task();
            fired += 1;
        }

        self.now.set(target);
        fired
    }

    /// Number of tasks waiting to run.
    pub fn pending_timers(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Deadline of the next task to run, if any.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.borrow().keys().next().map(|(deadline, _)| *deadline)
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let deadline = self.now.get() + delay;
        self.queue.borrow_mut().insert((deadline, id), task);
        self.deadlines.borrow_mut().insert(id, deadline);

        TimerHandle::new(id)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        let Some(deadline) = self.deadlines.borrow_mut().remove(&handle.id()) else {
            return false;
        };
        // Drop the task after the borrow ends; its captures may hold anything.
        let task = self.queue.borrow_mut().remove(&(deadline, handle.id()));
        task.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_advance_runs_due_tasks_in_order() {
        let scheduler = ManualScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for (delay, name) in [(300, "c"), (100, "a"), (200, "b")] {
            let log = log.clone();
            scheduler.schedule(
                Duration::from_millis(delay),
                Box::new(move || log.borrow_mut().push(name)),
            );
        }

        assert_eq!(scheduler.advance(Duration::from_millis(250)), 2);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(scheduler.now(), Duration::from_millis(250));
        assert_eq!(scheduler.pending_timers(), 1);

        scheduler.advance(Duration::from_millis(50));
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cancel() {
        let scheduler = ManualScheduler::new();
        let fired = Rc::new(Cell::new(false));

        let flag = fired.clone();
        let handle = scheduler.schedule(Duration::from_secs(1), Box::new(move || flag.set(true)));

        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));

        scheduler.advance(Duration::from_secs(2));
        assert!(!fired.get());
    }

    #[test]
    fn test_task_can_reschedule_within_window() {
        let scheduler = Rc::new(ManualScheduler::new());
        let count = Rc::new(Cell::new(0));

        let inner_scheduler = scheduler.clone();
        let inner_count = count.clone();
        scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                inner_count.set(inner_count.get() + 1);
                let again = inner_count.clone();
                inner_scheduler.schedule(
                    Duration::from_millis(10),
                    Box::new(move || again.set(again.get() + 1)),
                );
            }),
        );

        assert_eq!(scheduler.advance(Duration::from_millis(20)), 2);
        assert_eq!(count.get(), 2);
        assert_eq!(scheduler.next_deadline(), None);
    }
}
