//! Sequential multi-item tasks with weighted progress.
//!
//! A task runs a fixed, ordered list of items one after the other, as the
//! firmware download and update operations do. The user starts it, the
//! peripheral then drives it through `begin`, `continue`, progress and
//! terminal-state reports, and finally `end`. A terminal state stays visible
//! for one commit before `end` clears the task, so observers always get a
//! chance to see how it finished.

use std::cell::RefCell;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::component::ComponentCore;

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    /// Accepted by the backend, not started by the peripheral yet.
    Pending,
    /// An item is being processed.
    Running,
    /// Every item completed.
    Success,
    /// The peripheral gave up.
    Failed,
    /// Stopped on request.
    Canceled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Canceled)
    }
}

/// An item whose size weighs on the aggregate progress.
pub trait Weighted {
    /// Weight of the item, typically its size in bytes.
    fn weight(&self) -> u64;
}

/// A snapshot of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct Task<I> {
    items: Vec<I>,
    index: usize,
    item_progress: u8,
    state: TaskState,
}

impl<I: Weighted> Task<I> {
    fn new(items: Vec<I>, state: TaskState) -> Self {
        Self {
            items,
            index: 0,
            item_progress: 0,
            state,
        }
    }

    pub fn items(&self) -> &[I] {
        &self.items
    }

    /// Index of the item being processed.
    pub fn current_index(&self) -> usize {
        self.index
    }

    /// Item being processed.
    pub fn current_item(&self) -> Option<&I> {
        self.items.get(self.index)
    }

    /// Items left after the current one.
    pub fn remaining_items(&self) -> &[I] {
        self.items.get(self.index + 1..).unwrap_or(&[])
    }

    /// Progress of the current item, 0 to 100.
    pub fn item_progress(&self) -> u8 {
        self.item_progress
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Progress over all items, 0 to 100, weighted by item size.
    ///
    /// Items before the current one count in full, the current one by its
    /// own progress. When no item carries a weight every item counts the
    /// same.
    pub fn total_progress(&self) -> u8 {
        if self.state == TaskState::Success {
            return 100;
        }
        let uniform = self.items.iter().all(|item| item.weight() == 0);
        let weight = |item: &I| -> u128 {
            if uniform {
                1
            } else {
                u128::from(item.weight())
            }
        };

        let total: u128 = self.items.iter().map(weight).sum();
        if total == 0 {
            return 0;
        }
        let done: u128 = self.items.iter().take(self.index).map(weight).sum();
        let current = self.current_item().map_or(0, weight);
        let progress = (done * 100 + current * u128::from(self.item_progress)) / total;
        progress.min(100) as u8
    }
}

/// Tracks the current task of one kind on a component.
pub struct TaskTracker<I> {
    core: ComponentCore,
    name: &'static str,
    task: RefCell<Option<Task<I>>>,
}

impl<I> TaskTracker<I>
where
    I: Weighted + Clone + PartialEq + fmt::Debug,
{
    /// A tracker with no current task. `name` appears in logs.
    pub fn new(core: &ComponentCore, name: &'static str) -> Self {
        Self {
            core: core.clone(),
            name,
            task: RefCell::new(None),
        }
    }

    /// Current task, if any.
    pub fn current(&self) -> Option<Task<I>> {
        self.task.borrow().clone()
    }

    /// State of the current task, if any.
    pub fn state(&self) -> Option<TaskState> {
        self.task.borrow().as_ref().map(Task::state)
    }

    /// Aggregate progress of the current task, if any.
    pub fn total_progress(&self) -> Option<u8> {
        self.task.borrow().as_ref().map(Task::total_progress)
    }

    /// Check if a task is pending or running.
    pub fn is_active(&self) -> bool {
        self.state().is_some_and(|state| !state.is_terminal())
    }

    /// Start a task over `items` through `launch`.
    ///
    /// Rejected when `items` is empty or a task is already active. If
    /// `launch` accepts, the task appears as pending and observers are
    /// notified right away.
    pub fn start(&self, items: Vec<I>, launch: impl FnOnce(&[I]) -> bool) -> bool {
        if items.is_empty() {
            debug!(component = %self.core.key(), task = self.name, "nothing to do");
            return false;
        }
        if self.is_active() {
            debug!(component = %self.core.key(), task = self.name, "task already active");
            return false;
        }
        if !launch(&items) {
            debug!(component = %self.core.key(), task = self.name, "backend refused task");
            return false;
        }

        info!(component = %self.core.key(), task = self.name, items = items.len(), "task started");
        *self.task.borrow_mut() = Some(Task::new(items, TaskState::Pending));
        self.core.mark_changed();
        self.core.notify_updated();
        true
    }

    /// Ask the backend to cancel the active task.
    ///
    /// The task only turns `Canceled` when the peripheral reports it.
    pub fn cancel(&self, request: impl FnOnce() -> bool) -> bool {
        if !self.is_active() {
            return false;
        }
        request()
    }

    /// The peripheral started processing `items`, from the first one.
    pub fn update_begin(&self, items: Vec<I>) -> &Self {
        let task = Task::new(items, TaskState::Running);
        let mut current = self.task.borrow_mut();
        if current.as_ref() != Some(&task) {
            *current = Some(task);
            self.core.mark_changed();
        }
        self
    }

    /// The peripheral moved on to the next item.
    pub fn update_continue(&self) -> &Self {
        let key = self.core.key();
        let name = self.name;
        self.edit("continue", |task| {
            if task.index + 1 < task.items.len() {
                task.index += 1;
                task.item_progress = 0;
            } else {
                warn!(component = %key, task = name, "continue past the last item");
            }
            task.state = TaskState::Running;
        })
    }

    /// Progress of the current item; values above 100 are capped.
    pub fn update_progress(&self, progress: u8) -> &Self {
        self.edit("progress", |task| {
            task.item_progress = progress.min(100);
            if task.state == TaskState::Pending {
                task.state = TaskState::Running;
            }
        })
    }

    /// The peripheral reported a new task state.
    pub fn update_state(&self, state: TaskState) -> &Self {
        if state.is_terminal() {
            info!(component = %self.core.key(), task = self.name, ?state, "task finished");
        }
        self.edit("state", |task| task.state = state)
    }

    /// The peripheral is done with the task; it disappears.
    ///
    /// Only a finished task is removed. A late `end` for a task that already
    /// gave way to a new one leaves the new task alone.
    pub fn update_end(&self) -> &Self {
        let removed = {
            let mut current = self.task.borrow_mut();
            match current.as_ref().map(Task::state) {
                Some(state) if state.is_terminal() => current.take().is_some(),
                Some(state) => {
                    warn!(component = %self.core.key(), task = self.name, ?state, "end for an unfinished task");
                    false
                }
                None => false,
            }
        };
        if removed {
            self.core.mark_changed();
        }
        self
    }

    fn edit(&self, event: &str, apply: impl FnOnce(&mut Task<I>)) -> &Self {
        let changed = {
            let mut current = self.task.borrow_mut();
            match current.as_mut() {
                Some(task) => {
                    let before = task.clone();
                    apply(task);
                    *task != before
                }
                None => {
                    warn!(component = %self.core.key(), task = self.name, event, "no current task");
                    false
                }
            }
        };
        if changed {
            self.core.mark_changed();
        }
        self
    }
}

impl<I: fmt::Debug> fmt::Debug for TaskTracker<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskTracker")
            .field("name", &self.name)
            .field("task", &*self.task.borrow())
            .finish()
    }
}
