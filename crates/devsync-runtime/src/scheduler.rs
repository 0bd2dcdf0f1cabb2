//! Rollback timers on tokio's clock.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use devsync_core::{Scheduler, TimerHandle, TimerTask};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::trace;

type Timers = RefCell<HashMap<u64, AbortHandle>>;

/// A [`Scheduler`] running each timer as a local tokio task.
///
/// Must be used from inside a [`tokio::task::LocalSet`]: scheduling spawns
/// the timer with [`tokio::task::spawn_local`], so timers run on the same
/// thread as the model, between commands. Dropping the scheduler aborts
/// every timer still waiting.
pub struct TokioScheduler {
    start: Instant,
    next_id: Cell<u64>,
    timers: Rc<Timers>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            next_id: Cell::new(0),
            timers: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Number of timers waiting to run.
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let timers: Weak<Timers> = Rc::downgrade(&self.timers);
        let join = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            // Gone from the table means cancelled after the sleep completed.
            let live = match timers.upgrade() {
                Some(timers) => {
                    let removed = timers.borrow_mut().remove(&id);
                    removed.is_some()
                }
                None => false,
            };
            if live {
                trace!(timer = id, "timer fired");
                task();
            }
        });
        self.timers.borrow_mut().insert(id, join.abort_handle());

        TimerHandle::new(id)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        let removed = self.timers.borrow_mut().remove(&handle.id());
        match removed {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, timer) in self.timers.borrow_mut().drain() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::LocalSet;

    #[tokio::test(start_paused = true)]
    async fn test_timers_fire_in_deadline_order() {
        LocalSet::new()
            .run_until(async {
                let scheduler = TokioScheduler::new();
                let fired = Rc::new(RefCell::new(Vec::new()));

                for (name, ms) in [("late", 300), ("early", 100), ("middle", 200)] {
                    let fired = fired.clone();
                    scheduler.schedule(
                        Duration::from_millis(ms),
                        Box::new(move || fired.borrow_mut().push(name)),
                    );
                }
                assert_eq!(scheduler.pending_timers(), 3);

                tokio::time::sleep(Duration::from_millis(250)).await;
                assert_eq!(*fired.borrow(), vec!["early", "middle"]);
                assert_eq!(scheduler.pending_timers(), 1);
                assert!(scheduler.now() >= Duration::from_millis(250));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_runs() {
        LocalSet::new()
            .run_until(async {
                let scheduler = TokioScheduler::new();
                let fired = Rc::new(Cell::new(false));
                let flag = fired.clone();
                let handle =
                    scheduler.schedule(Duration::from_secs(1), Box::new(move || flag.set(true)));

                assert!(scheduler.cancel(handle));
                assert!(!scheduler.cancel(handle));
                tokio::time::sleep(Duration::from_secs(2)).await;
                assert!(!fired.get());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_waiting_timers() {
        LocalSet::new()
            .run_until(async {
                let fired = Rc::new(Cell::new(false));
                {
                    let scheduler = TokioScheduler::new();
                    let flag = fired.clone();
                    scheduler.schedule(Duration::from_secs(1), Box::new(move || flag.set(true)));
                }
                tokio::time::sleep(Duration::from_secs(2)).await;
                assert!(!fired.get());
            })
            .await;
    }
}
