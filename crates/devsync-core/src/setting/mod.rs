//! Optimistic settings with timeout-based rollback.
//!
//! A [`Setting`] holds the last value confirmed by the peripheral and, while
//! a user request is in flight, the requested value. Readers always see the
//! requested value while it is pending. The peripheral confirms by sending
//! any value back through [`Setting::update_value`]; if nothing comes back
//! before the rollback timer expires, the request is abandoned and the
//! confirmed value shows through again.
//!
//! The same engine backs single values and compound settings: a compound
//! setting is a `Setting` whose value is a tuple of correlated fields and
//! whose capability filter is a table of legal combinations.

mod filter;
mod typed;

pub use filter::{AnyValue, Availability, Bounds, EnumSet, StringFormat};
pub use typed::{
    BooleanSetting, EnumSetting, OptionalBooleanSetting, RangeSetting, StringSetting,
};

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::component::{ComponentCore, Rollback};
use crate::config::SyncConfig;
use crate::scheduler::{Scheduler, TimerHandle};

/// Decides which values a setting may request.
///
/// Filters only gate future requests: narrowing a filter never alters the
/// confirmed or pending value.
pub trait CapabilityFilter<T> {
    /// Check if `value` may be sent to the peripheral.
    fn admits(&self, value: &T) -> bool;
}

/// Confirmation state of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateState {
    /// The observed value is the one confirmed by the peripheral.
    UpToDate,
    /// A requested value is waiting for confirmation.
    Updating,
}

/// Point-in-time view of a setting, for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingSnapshot<T> {
    pub value: T,
    pub state: UpdateState,
}

/// Everything a setting needs from its owner: where to stage changes, which
/// timeline to schedule rollbacks on, and how long to wait.
#[derive(Clone)]
pub struct SettingContext {
    core: ComponentCore,
    scheduler: Rc<dyn Scheduler>,
    timeout: Duration,
}

impl SettingContext {
    /// Create a context with an explicit rollback timeout.
    pub fn new(core: ComponentCore, scheduler: Rc<dyn Scheduler>, timeout: Duration) -> Self {
        Self {
            core,
            scheduler,
            timeout,
        }
    }

    /// Create a context using the timeout configured for the owner.
    pub fn from_config(
        core: ComponentCore,
        scheduler: Rc<dyn Scheduler>,
        config: &SyncConfig,
    ) -> Self {
        let timeout = config.rollback_timeout_for(core.key().name());
        Self::new(core, scheduler, timeout)
    }

    /// Owning component core.
    pub fn core(&self) -> &ComponentCore {
        &self.core
    }

    /// Timeline used for rollback timers.
    pub fn scheduler(&self) -> &Rc<dyn Scheduler> {
        &self.scheduler
    }

    /// Rollback timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for SettingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingContext")
            .field("core", &self.core)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Backend call dispatching a requested value. Returns whether the request
/// was admitted locally, which does not mean the peripheral applied it.
pub type Sender<T> = Box<dyn Fn(&T) -> bool>;

struct State<T, F> {
    backend: T,
    pending: Option<T>,
    filter: F,
    timer: Option<TimerHandle>,
    epoch: u64,
    /// Bumped by every backend report.
    reports: u64,
}

impl<T, F> State<T, F> {
    fn observed(&self) -> &T {
        self.pending.as_ref().unwrap_or(&self.backend)
    }
}

struct SettingCell<T, F> {
    ctx: SettingContext,
    sender: Sender<T>,
    state: RefCell<State<T, F>>,
}

impl<T, F> SettingCell<T, F>
where
    T: fmt::Debug,
{
    fn on_timeout(&self, epoch: u64) {
        let abandoned = {
            let mut state = self.state.borrow_mut();
            // A newer request or a backend update superseded this timer.
            if state.epoch != epoch || state.pending.is_none() {
                return;
            }
            state.timer = None;
            state.pending.take()
        };
        debug!(
            component = %self.ctx.core.key(),
            abandoned = ?abandoned,
            restored = ?self.state.borrow().backend,
            "setting rolled back"
        );
        self.ctx.core.mark_changed();
        self.ctx.core.notify_updated();
    }
}

impl<T, F> Rollback for SettingCell<T, F> {
    fn cancel_rollback(&self) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(pending) = state.pending.take() else {
            return false;
        };
        if let Some(timer) = state.timer.take() {
            self.ctx.scheduler.cancel(timer);
        }
        state.backend = pending;
        self.ctx.core.mark_changed();
        true
    }
}

impl<T, F> Drop for SettingCell<T, F> {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().timer.take() {
            self.ctx.scheduler.cancel(timer);
        }
    }
}

/// An optimistic, rollback-capable value synchronized with a peripheral.
///
/// `Setting` is a cheap handle; clones share the same state. User-facing
/// methods (`set_value`, `modify`) notify observers immediately when a
/// request is dispatched. Backend-facing methods (`update_*`) only stage
/// changes on the owning component.
pub struct Setting<T, F> {
    cell: Rc<SettingCell<T, F>>,
}

impl<T, F> Clone for Setting<T, F> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T, F> Setting<T, F>
where
    T: Clone + PartialEq + fmt::Debug + 'static,
    F: CapabilityFilter<T> + PartialEq + 'static,
{
    /// Create a setting at `initial`, confirmed, filtered by `filter`, that
    /// dispatches requests through `sender`.
    pub fn new<S>(ctx: &SettingContext, initial: T, filter: F, sender: S) -> Self
    where
        S: Fn(&T) -> bool + 'static,
    {
        let cell = Rc::new(SettingCell {
            ctx: ctx.clone(),
            sender: Box::new(sender),
            state: RefCell::new(State {
                backend: initial,
                pending: None,
                filter,
                timer: None,
                epoch: 0,
                reports: 0,
            }),
        });

        let rollback: Rc<dyn Rollback> = cell.clone();
        ctx.core.register_rollback(Rc::downgrade(&rollback));

        Self { cell }
    }

    /// The observed value: the pending request if any, else the confirmed
    /// value.
    pub fn value(&self) -> T {
        self.cell.state.borrow().observed().clone()
    }

    /// The last value confirmed by the peripheral.
    pub fn confirmed_value(&self) -> T {
        self.cell.state.borrow().backend.clone()
    }

    /// Current confirmation state.
    pub fn state(&self) -> UpdateState {
        if self.is_updating() {
            UpdateState::Updating
        } else {
            UpdateState::UpToDate
        }
    }

    /// Check if a request is waiting for confirmation.
    pub fn is_updating(&self) -> bool {
        self.cell.state.borrow().pending.is_some()
    }

    /// Check if `value` passes the capability filter.
    pub fn is_supported(&self, value: &T) -> bool {
        self.cell.state.borrow().filter.admits(value)
    }

    /// Read the capability filter.
    pub fn with_filter<R>(&self, read: impl FnOnce(&F) -> R) -> R {
        read(&self.cell.state.borrow().filter)
    }

    /// Serializable view of the setting.
    pub fn snapshot(&self) -> SettingSnapshot<T> {
        SettingSnapshot {
            value: self.value(),
            state: self.state(),
        }
    }

    /// Request a new value.
    ///
    /// Returns true if the request was dispatched. Unsupported values and
    /// values equal to the observed one are dropped silently; a request the
    /// backend refuses leaves the setting untouched.
    pub fn set_value(&self, value: T) -> bool {
        let key = self.cell.ctx.core.key();
        {
            let state = self.cell.state.borrow();
            if !state.filter.admits(&value) {
                debug!(component = %key, ?value, "ignoring unsupported value");
                return false;
            }
            if *state.observed() == value {
                return false;
            }
        }

        // The backend may feed a value back synchronously; no borrow is held.
        let reports = self.cell.state.borrow().reports;
        if !(self.cell.sender)(&value) {
            debug!(component = %key, ?value, "backend refused request");
            return false;
        }

        if self.cell.state.borrow().reports != reports {
            debug!(component = %key, ?value, "request confirmed during dispatch");
        } else {
            debug!(component = %key, ?value, "request dispatched");
            self.cell.state.borrow_mut().pending = Some(value);
            self.schedule_rollback();
            self.cell.ctx.core.mark_changed();
        }
        self.cell.ctx.core.notify_updated();
        true
    }

    /// Request the observed value edited by `edit`.
    ///
    /// This is how compound settings change one field: the whole tuple is
    /// re-validated and re-sent.
    pub fn modify(&self, edit: impl FnOnce(&mut T)) -> bool {
        let mut next = self.value();
        edit(&mut next);
        self.set_value(next)
    }

    /// Adopt a value reported by the peripheral.
    ///
    /// Any pending request is resolved, whether or not `value` matches it.
    pub fn update_value(&self, value: T) -> &Self {
        let changed = {
            let mut state = self.cell.state.borrow_mut();
            let mut changed = false;
            state.reports = state.reports.wrapping_add(1);
            if state.pending.take().is_some() {
                if let Some(timer) = state.timer.take() {
                    self.cell.ctx.scheduler.cancel(timer);
                }
                changed = true;
            }
            if state.backend != value {
                state.backend = value;
                changed = true;
            }
            changed
        };
        if changed {
            self.cell.ctx.core.mark_changed();
        }
        self
    }

    /// Adopt a value reported by the peripheral, expressed as an edit of the
    /// confirmed value.
    pub fn update_with(&self, edit: impl FnOnce(&mut T)) -> &Self {
        let mut next = self.confirmed_value();
        edit(&mut next);
        self.update_value(next)
    }

    /// Replace the capability filter.
    pub fn update_filter(&self, filter: F) -> &Self {
        let changed = {
            let mut state = self.cell.state.borrow_mut();
            if state.filter == filter {
                false
            } else {
                state.filter = filter;
                true
            }
        };
        if changed {
            self.cell.ctx.core.mark_changed();
        }
        self
    }

    /// Adopt the pending request as confirmed without waiting.
    ///
    /// Stages a change on the owning component; the caller commits.
    pub fn cancel_rollback(&self) -> bool {
        Rollback::cancel_rollback(&*self.cell)
    }

    fn schedule_rollback(&self) {
        let mut state = self.cell.state.borrow_mut();
        if let Some(timer) = state.timer.take() {
            self.cell.ctx.scheduler.cancel(timer);
        }
        state.epoch = state.epoch.wrapping_add(1);
        let epoch = state.epoch;

        let weak: Weak<SettingCell<T, F>> = Rc::downgrade(&self.cell);
        let timer = self.cell.ctx.scheduler.schedule(
            self.cell.ctx.timeout,
            Box::new(move || {
                if let Some(cell) = weak.upgrade() {
                    cell.on_timeout(epoch);
                }
            }),
        );
        state.timer = Some(timer);
    }
}

impl<T, F> fmt::Debug for Setting<T, F>
where
    T: fmt::Debug,
    F: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.cell.state.borrow();
        f.debug_struct("Setting")
            .field("value", state.observed())
            .field("updating", &state.pending.is_some())
            .field("filter", &state.filter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::scheduler::ManualScheduler;
    use crate::store::{ChangeKind, ComponentStore};
    use std::cell::Cell;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Mode {
        X,
        Y,
        Z,
    }

    struct Fixture {
        scheduler: Rc<ManualScheduler>,
        core: ComponentCore,
        accept: Rc<Cell<bool>>,
        sent: Rc<RefCell<Vec<Mode>>>,
        notifications: Rc<Cell<usize>>,
        setting: EnumSetting<Mode>,
        _store: ComponentStore,
        _owner: Rc<Owner>,
    }

    struct Owner {
        core: ComponentCore,
    }

    impl Component for Owner {
        const NAME: &'static str = "owner";

        fn core(&self) -> &ComponentCore {
            &self.core
        }
    }

    fn fixture() -> Fixture {
        let store = ComponentStore::new();
        let scheduler = Rc::new(ManualScheduler::new());
        let core = ComponentCore::new::<Owner>(&store);
        let owner = Rc::new(Owner { core: core.clone() });
        let ctx = SettingContext::new(core.clone(), scheduler.clone(), TIMEOUT);

        let accept = Rc::new(Cell::new(true));
        let sent = Rc::new(RefCell::new(Vec::new()));
        let setting = {
            let accept = accept.clone();
            let sent = sent.clone();
            EnumSetting::new(&ctx, Mode::X, EnumSet::of([Mode::X, Mode::Y]), move |mode| {
                sent.borrow_mut().push(*mode);
                accept.get()
            })
        };

        owner.clone().publish();
        let notifications = Rc::new(Cell::new(0));
        let counter = notifications.clone();
        store.register_observer(move |event| {
            if event.kind == ChangeKind::Changed {
                counter.set(counter.get() + 1);
            }
        });

        Fixture {
            scheduler,
            core,
            accept,
            sent,
            notifications,
            setting,
            _store: store,
            _owner: owner,
        }
    }

    #[test]
    fn test_set_value_then_timeout_rolls_back() {
        let f = fixture();

        assert!(f.setting.set_value(Mode::Y));
        assert_eq!(f.setting.state(), UpdateState::Updating);
        assert_eq!(f.setting.value(), Mode::Y);
        assert_eq!(f.setting.confirmed_value(), Mode::X);
        assert_eq!(f.notifications.get(), 1);

        f.scheduler.advance(TIMEOUT);
        assert_eq!(f.setting.state(), UpdateState::UpToDate);
        assert_eq!(f.setting.value(), Mode::X);
        assert_eq!(f.notifications.get(), 2);
    }

    #[test]
    fn test_backend_refusal_leaves_state_untouched() {
        let f = fixture();
        f.accept.set(false);

        assert!(!f.setting.set_value(Mode::Y));
        assert_eq!(f.setting.state(), UpdateState::UpToDate);
        assert_eq!(f.setting.value(), Mode::X);
        assert_eq!(f.notifications.get(), 0);
        assert_eq!(f.scheduler.pending_timers(), 0);
        assert_eq!(*f.sent.borrow(), vec![Mode::Y]);
    }

    #[test]
    fn test_unsupported_or_equal_value_is_silently_ignored() {
        let f = fixture();

        assert!(!f.setting.set_value(Mode::Z));
        assert!(!f.setting.set_value(Mode::X));
        assert!(f.sent.borrow().is_empty());
        assert_eq!(f.notifications.get(), 0);

        // Equal to the pending value counts as equal to the observed value.
        assert!(f.setting.set_value(Mode::Y));
        assert!(!f.setting.set_value(Mode::Y));
        assert_eq!(f.sent.borrow().len(), 1);
    }

    #[test]
    fn test_backend_update_resolves_pending_even_when_different() {
        let f = fixture();
        f.setting.set_value(Mode::Y);

        f.setting.update_value(Mode::X);
        assert_eq!(f.setting.state(), UpdateState::UpToDate);
        assert_eq!(f.setting.value(), Mode::X);
        assert_eq!(f.scheduler.pending_timers(), 0);
        assert!(f.core.notify_updated());

        // The cancelled timer must not fire a late rollback.
        f.scheduler.advance(TIMEOUT * 2);
        assert_eq!(f.notifications.get(), 2);
    }

    #[test]
    fn test_confirmation_during_dispatch_leaves_setting_up_to_date() {
        let f = fixture();
        let ctx = SettingContext::new(f.core.clone(), f.scheduler.clone(), TIMEOUT);
        let slot: Rc<RefCell<Option<EnumSetting<Mode>>>> = Rc::default();
        let echo = slot.clone();
        let setting = EnumSetting::new(
            &ctx,
            Mode::X,
            EnumSet::of([Mode::X, Mode::Y]),
            move |mode: &Mode| {
                if let Some(setting) = echo.borrow().as_ref() {
                    setting.update_value(*mode);
                }
                true
            },
        );
        *slot.borrow_mut() = Some(setting.clone());

        assert!(setting.set_value(Mode::Y));
        assert_eq!(setting.state(), UpdateState::UpToDate);
        assert_eq!(setting.confirmed_value(), Mode::Y);
        assert_eq!(f.scheduler.pending_timers(), 0);
        assert_eq!(f.notifications.get(), 1);

        f.scheduler.advance(TIMEOUT);
        assert_eq!(setting.value(), Mode::Y);
        assert_eq!(f.notifications.get(), 1);
        slot.borrow_mut().take();
    }

    #[test]
    fn test_update_value_no_op_is_not_staged() {
        let f = fixture();
        f.setting.update_value(Mode::X);
        assert!(!f.core.has_pending_changes());

        f.setting.update_value(Mode::Z);
        assert!(f.core.has_pending_changes());
        assert_eq!(f.setting.value(), Mode::Z);
    }

    #[test]
    fn test_new_request_restarts_timer() {
        let f = fixture();
        f.setting.update_filter(EnumSet::of([Mode::X, Mode::Y, Mode::Z]));

        f.setting.set_value(Mode::Y);
        f.scheduler.advance(Duration::from_secs(3));
        f.setting.set_value(Mode::Z);
        assert_eq!(f.scheduler.pending_timers(), 1);

        f.scheduler.advance(Duration::from_secs(3));
        assert_eq!(f.setting.value(), Mode::Z);

        f.scheduler.advance(Duration::from_secs(2));
        assert_eq!(f.setting.value(), Mode::X);
    }

    #[test]
    fn test_filter_narrowing_keeps_pending_value() {
        let f = fixture();
        f.setting.set_value(Mode::Y);

        f.setting.update_filter(EnumSet::of([Mode::X]));
        assert_eq!(f.setting.value(), Mode::Y);
        assert!(f.setting.is_updating());
        assert!(!f.setting.is_supported(&Mode::Y));
    }

    #[test]
    fn test_bulk_cancel_is_immune_to_stale_timer() {
        let f = fixture();
        f.setting.set_value(Mode::Y);
        let before = f.notifications.get();

        f.core.cancel_settings_rollbacks();
        assert_eq!(f.setting.value(), Mode::Y);
        assert_eq!(f.setting.confirmed_value(), Mode::Y);
        assert_eq!(f.notifications.get(), before + 1);

        f.scheduler.advance(TIMEOUT);
        assert_eq!(f.setting.value(), Mode::Y);
        assert_eq!(f.notifications.get(), before + 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let f = fixture();
        f.setting.set_value(Mode::Y);

        let snapshot = f.setting.snapshot();
        assert_eq!(snapshot.state, UpdateState::Updating);
        let json = serde_json::to_string(&SettingSnapshot {
            value: 1u8,
            state: snapshot.state,
        })
        .unwrap();
        assert_eq!(json, r#"{"value":1,"state":"updating"}"#);
    }
}
