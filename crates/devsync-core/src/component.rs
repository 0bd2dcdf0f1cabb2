//! Component lifecycle and change batching.
//!
//! A component stages backend-originated changes through its `update_*`
//! mutators and commits them with [`Component::notify_updated`]. Only a
//! commit reaches observers, and only if at least one staged mutation really
//! changed a value.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::store::{ChangeKind, ComponentEvent, ComponentKey, ComponentStore, StoreInner};

/// Something owned by a component that may hold a pending request.
pub(crate) trait Rollback {
    /// Adopt the pending request as confirmed, if any. Stages a change but
    /// does not notify.
    fn cancel_rollback(&self) -> bool;
}

/// A peripheral data model living in a [`ComponentStore`].
pub trait Component: Any {
    /// Name used in logs and configuration overrides.
    const NAME: &'static str;

    /// Shared lifecycle state.
    fn core(&self) -> &ComponentCore;

    /// Install the component in its store and notify observers once.
    ///
    /// Changes staged before publication are folded into the publication
    /// itself; they do not produce a separate notification.
    fn publish(self: Rc<Self>)
    where
        Self: Sized,
    {
        let core = self.core().clone();
        core.install(self);
    }

    /// Remove the component from its store and notify observers once.
    fn unpublish(&self) {
        self.core().unpublish();
    }

    /// Commit staged changes. Returns true if observers were notified.
    fn notify_updated(&self) -> bool {
        self.core().notify_updated()
    }

    /// Check if the component is currently in its store.
    fn is_published(&self) -> bool {
        self.core().is_published()
    }

    /// Resolve every pending setting request to its requested value, then
    /// commit once.
    fn cancel_settings_rollbacks(&self) {
        self.core().cancel_settings_rollbacks();
    }
}

struct CoreInner {
    key: ComponentKey,
    store: Weak<StoreInner>,
    published: Cell<bool>,
    changed: Cell<bool>,
    rollbacks: RefCell<Vec<Weak<dyn Rollback>>>,
}

/// Lifecycle flag, dirty flag and store link shared by a component and all
/// of its settings.
#[derive(Clone)]
pub struct ComponentCore {
    inner: Rc<CoreInner>,
}

impl ComponentCore {
    /// Create the core of a component of type `T`, not yet published.
    pub fn new<T: Component>(store: &ComponentStore) -> Self {
        Self {
            inner: Rc::new(CoreInner {
                key: ComponentKey::of::<T>(),
                store: store.downgrade(),
                published: Cell::new(false),
                changed: Cell::new(false),
                rollbacks: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Key of the owning component type.
    pub fn key(&self) -> ComponentKey {
        self.inner.key
    }

    /// Check if the owning component is published.
    pub fn is_published(&self) -> bool {
        self.inner.published.get()
    }

    /// Record that a staged mutation changed an observable value.
    pub fn mark_changed(&self) {
        self.inner.changed.set(true);
    }

    /// Check if changes are staged and not yet committed.
    pub fn has_pending_changes(&self) -> bool {
        self.inner.changed.get()
    }

    /// Commit staged changes.
    ///
    /// Returns true if a notification was sent. Nothing is sent when no
    /// staged mutation changed a value, or when the component is not
    /// published; the staged changes are discarded in both cases.
    pub fn notify_updated(&self) -> bool {
        if !self.inner.changed.replace(false) {
            return false;
        }
        if !self.inner.published.get() {
            return false;
        }
        match ComponentStore::upgrade(&self.inner.store) {
            Some(store) => {
                store.notify(ComponentEvent {
                    key: self.inner.key,
                    kind: ChangeKind::Changed,
                });
                true
            }
            None => false,
        }
    }

    /// Resolve every pending setting request, then commit once.
    pub fn cancel_settings_rollbacks(&self) {
        let mut resolved = 0;
        for rollback in self.live_rollbacks() {
            if rollback.cancel_rollback() {
                resolved += 1;
            }
        }
        debug!(component = %self.inner.key, resolved, "cancelled settings rollbacks");
        self.notify_updated();
    }

    pub(crate) fn register_rollback(&self, rollback: Weak<dyn Rollback>) {
        let mut rollbacks = self.inner.rollbacks.borrow_mut();
        rollbacks.retain(|entry| entry.strong_count() > 0);
        rollbacks.push(rollback);
    }

    pub(crate) fn install(&self, component: Rc<dyn Any>) {
        if self.inner.published.get() {
            self.notify_updated();
            return;
        }
        let Some(store) = ComponentStore::upgrade(&self.inner.store) else {
            warn!(component = %self.inner.key, "cannot publish, store is gone");
            return;
        };
        if store.holds(self.inner.key) {
            warn!(component = %self.inner.key, "another instance is already published");
            return;
        }
        self.inner.published.set(true);
        self.inner.changed.set(false);
        store.insert(self.inner.key, component);
    }

    pub(crate) fn unpublish(&self) {
        if !self.inner.published.replace(false) {
            return;
        }
        for rollback in self.live_rollbacks() {
            rollback.cancel_rollback();
        }
        self.inner.changed.set(false);
        if let Some(store) = ComponentStore::upgrade(&self.inner.store) {
            store.remove(self.inner.key);
        }
    }

    fn live_rollbacks(&self) -> Vec<Rc<dyn Rollback>> {
        self.inner
            .rollbacks
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

impl fmt::Debug for ComponentCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentCore")
            .field("key", &self.inner.key)
            .field("published", &self.inner.published.get())
            .field("changed", &self.inner.changed.get())
            .finish()
    }
}
