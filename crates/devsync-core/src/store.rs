//! Component store.
//!
//! The store keeps at most one published instance per component type and
//! tells registered observers when a component appears, changes or goes away.
//! Components hold only a weak link back to the store, so dropping the store
//! never leaks through a component that is still published.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, info};

use crate::component::Component;

/// Identifies a component type in the store.
#[derive(Debug, Clone, Copy)]
pub struct ComponentKey {
    type_id: TypeId,
    name: &'static str,
}

impl ComponentKey {
    /// Key of the component type `T`.
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: T::NAME,
        }
    }

    /// Human readable name of the component type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ComponentKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentKey {}

impl std::hash::Hash for ComponentKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// What happened to a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The component was installed in the store.
    Published,
    /// A batch of staged changes was committed.
    Changed,
    /// The component was removed from the store.
    Unpublished,
}

/// Notification delivered to store observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentEvent {
    pub key: ComponentKey,
    pub kind: ChangeKind,
}

/// Registration token returned by [`ComponentStore::register_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Rc<RefCell<dyn FnMut(&ComponentEvent)>>;

#[derive(Default)]
pub(crate) struct StoreInner {
    components: RefCell<HashMap<ComponentKey, Rc<dyn Any>>>,
    observers: RefCell<Vec<(ObserverId, Observer)>>,
    next_observer: Cell<u64>,
    queued: RefCell<VecDeque<ComponentEvent>>,
    dispatching: Cell<bool>,
}

/// Registry of published components.
///
/// Cloning the store is cheap and yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct ComponentStore {
    inner: Rc<StoreInner>,
}

impl ComponentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the published component of type `T`.
    pub fn get<T: Component>(&self) -> Option<Rc<T>> {
        let component = self
            .inner
            .components
            .borrow()
            .get(&ComponentKey::of::<T>())
            .cloned()?;
        component.downcast::<T>().ok()
    }

    /// Check if a component of type `T` is published.
    pub fn contains<T: Component>(&self) -> bool {
        self.inner
            .components
            .borrow()
            .contains_key(&ComponentKey::of::<T>())
    }

    /// Number of published components.
    pub fn len(&self) -> usize {
        self.inner.components.borrow().len()
    }

    /// Check if no component is published.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a callback invoked for every component event.
    ///
    /// Callbacks may read the store and trigger further changes; events
    /// raised while a dispatch is in progress are queued and delivered in
    /// order once the current one completes.
    pub fn register_observer<F>(&self, observer: F) -> ObserverId
    where
        F: FnMut(&ComponentEvent) + 'static,
    {
        let id = ObserverId(self.inner.next_observer.get());
        self.inner.next_observer.set(id.0 + 1);

        let observer: Observer = Rc::new(RefCell::new(observer));
        self.inner.observers.borrow_mut().push((id, observer));
        id
    }

    /// Remove a previously registered observer.
    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.inner.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(registered, _)| *registered != id);
        observers.len() != before
    }

    pub(crate) fn downgrade(&self) -> Weak<StoreInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(inner: &Weak<StoreInner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn holds(&self, key: ComponentKey) -> bool {
        self.inner.components.borrow().contains_key(&key)
    }

    pub(crate) fn insert(&self, key: ComponentKey, component: Rc<dyn Any>) {
        self.inner.components.borrow_mut().insert(key, component);
        info!(component = %key, "component published");
        self.notify(ComponentEvent {
            key,
            kind: ChangeKind::Published,
        });
    }

    pub(crate) fn remove(&self, key: ComponentKey) {
        // Keep the instance alive until the borrow is released.
        let removed = self.inner.components.borrow_mut().remove(&key);
        if removed.is_some() {
            info!(component = %key, "component unpublished");
            self.notify(ComponentEvent {
                key,
                kind: ChangeKind::Unpublished,
            });
        }
    }

    pub(crate) fn notify(&self, event: ComponentEvent) {
        self.inner.queued.borrow_mut().push_back(event);
        if self.inner.dispatching.replace(true) {
            return;
        }
        let _dispatch = DispatchGuard(&self.inner.dispatching);

        loop {
            let next = self.inner.queued.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };

            debug!(component = %event.key, kind = ?event.kind, "dispatching component event");
            let observers: Vec<Observer> = self
                .inner
                .observers
                .borrow()
                .iter()
                .map(|(_, observer)| observer.clone())
                .collect();

            for observer in observers {
                let mut callback = observer.borrow_mut();
                (&mut *callback)(&event);
            }
        }
    }
}

/// Clears the dispatching flag even if an observer panics.
struct DispatchGuard<'a>(&'a Cell<bool>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl fmt::Debug for ComponentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .inner
            .components
            .borrow()
            .keys()
            .map(ComponentKey::name)
            .collect();
        f.debug_struct("ComponentStore")
            .field("components", &names)
            .field("observers", &self.inner.observers.borrow().len())
            .finish()
    }
}
