//! Attributes keyed by a dynamic domain.
//!
//! A [`KeyDomain`] holds the set of keys the peripheral currently supports,
//! for instance the axes of a gimbal. Every [`KeyedAttribute`] created on a
//! domain keeps exactly one entry per supported key: when the domain shrinks
//! the entries of removed keys are dropped, and when it grows the new keys
//! get a freshly built entry. Nothing is remembered across a removal.
//!
//! Entries may be plain values (bounds, readings) or full settings; in the
//! latter case each key has its own rollback timer.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};

use thiserror::Error;
use tracing::{debug, warn};

use crate::component::ComponentCore;

/// A key outside the supported domain was used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{component}.{attribute}: key {key} is not supported")]
pub struct KeyError {
    pub component: &'static str,
    pub attribute: &'static str,
    pub key: String,
}

trait KeySync<K> {
    /// Bring the entries in line with `keys`. Returns true if anything
    /// changed.
    fn sync(&self, keys: &BTreeSet<K>) -> bool;
}

struct DomainInner<K> {
    core: ComponentCore,
    keys: RefCell<BTreeSet<K>>,
    members: RefCell<Vec<Weak<dyn KeySync<K>>>>,
}

/// The set of keys supported by a peripheral.
pub struct KeyDomain<K> {
    inner: Rc<DomainInner<K>>,
}

impl<K> Clone for KeyDomain<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K> KeyDomain<K>
where
    K: Ord + Clone + fmt::Debug + 'static,
{
    /// An empty domain owned by `core`.
    pub fn new(core: &ComponentCore) -> Self {
        Self {
            inner: Rc::new(DomainInner {
                core: core.clone(),
                keys: RefCell::new(BTreeSet::new()),
                members: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Currently supported keys.
    pub fn keys(&self) -> BTreeSet<K> {
        self.inner.keys.borrow().clone()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.keys.borrow().contains(key)
    }

    /// Replace the supported keys and resynchronize every attribute.
    pub fn update_keys(&self, keys: impl IntoIterator<Item = K>) -> &Self {
        let keys: BTreeSet<K> = keys.into_iter().collect();
        if *self.inner.keys.borrow() == keys {
            return self;
        }
        debug!(component = %self.inner.core.key(), ?keys, "supported keys changed");

        let members: Vec<Rc<dyn KeySync<K>>> = {
            let mut members = self.inner.members.borrow_mut();
            members.retain(|member| member.strong_count() > 0);
            members.iter().filter_map(Weak::upgrade).collect()
        };
        for member in &members {
            member.sync(&keys);
        }

        *self.inner.keys.borrow_mut() = keys;
        self.inner.core.mark_changed();
        self
    }

    fn attach(&self, member: Weak<dyn KeySync<K>>) {
        self.inner.members.borrow_mut().push(member);
    }
}

impl<K: fmt::Debug> fmt::Debug for KeyDomain<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyDomain")
            .field(&*self.inner.keys.borrow())
            .finish()
    }
}

type Factory<K, V> = Box<dyn Fn(&K) -> V>;

struct AttributeInner<K, V> {
    core: ComponentCore,
    name: &'static str,
    entries: RefCell<BTreeMap<K, V>>,
    make: Factory<K, V>,
}

impl<K: Ord + Clone, V> KeySync<K> for AttributeInner<K, V> {
    fn sync(&self, keys: &BTreeSet<K>) -> bool {
        let (removed, missing) = {
            let mut entries = self.entries.borrow_mut();
            let stale: Vec<K> = entries
                .keys()
                .filter(|key| !keys.contains(*key))
                .cloned()
                .collect();
            // Removed entries are dropped outside the borrow.
            let removed: Vec<V> = stale.iter().filter_map(|key| entries.remove(key)).collect();
            let missing: Vec<K> = keys
                .iter()
                .filter(|key| !entries.contains_key(*key))
                .cloned()
                .collect();
            (removed, missing)
        };

        // Building an entry may register a setting with the component.
        let fresh: Vec<(K, V)> = missing
            .into_iter()
            .map(|key| {
                let value = (self.make)(&key);
                (key, value)
            })
            .collect();

        let changed = !removed.is_empty() || !fresh.is_empty();
        self.entries.borrow_mut().extend(fresh);
        drop(removed);
        if changed {
            self.core.mark_changed();
        }
        changed
    }
}

/// One value per supported key.
pub struct KeyedAttribute<K, V> {
    inner: Rc<AttributeInner<K, V>>,
}

impl<K, V> Clone for KeyedAttribute<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K, V> KeyedAttribute<K, V>
where
    K: Ord + Clone + fmt::Debug + 'static,
    V: Clone + 'static,
{
    /// Create an attribute on `domain`. `make` builds the entry of a key
    /// when it enters the domain, including the keys supported right now.
    pub fn new<M>(domain: &KeyDomain<K>, name: &'static str, make: M) -> Self
    where
        M: Fn(&K) -> V + 'static,
    {
        let inner = Rc::new(AttributeInner {
            core: domain.inner.core.clone(),
            name,
            entries: RefCell::new(BTreeMap::new()),
            make: Box::new(make),
        });
        inner.sync(&domain.inner.keys.borrow());

        let member: Rc<dyn KeySync<K>> = inner.clone();
        domain.attach(Rc::downgrade(&member));
        Self { inner }
    }

    /// Attribute name, used in errors and logs.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Entry for `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not supported. Check [`KeyDomain::contains`] or
    /// use [`KeyedAttribute::try_get`] when the key comes from outside.
    pub fn get(&self, key: &K) -> V {
        match self.try_get(key) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Entry for `key`, or an error if the key is not supported.
    pub fn try_get(&self, key: &K) -> Result<V, KeyError> {
        self.inner
            .entries
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| KeyError {
                component: self.inner.core.key().name(),
                attribute: self.inner.name,
                key: format!("{key:?}"),
            })
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.entries.borrow().contains_key(key)
    }

    /// Keys that currently have an entry.
    pub fn keys(&self) -> Vec<K> {
        self.inner.entries.borrow().keys().cloned().collect()
    }

    /// All entries, in key order.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.inner
            .entries
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl<K, V> KeyedAttribute<K, V>
where
    K: Ord + Clone + fmt::Debug + 'static,
    V: Clone + PartialEq + 'static,
{
    /// Store a value reported by the peripheral.
    ///
    /// Reports for unsupported keys are dropped with a warning; the
    /// peripheral is not allowed to extend the domain through them.
    pub fn update(&self, key: &K, value: V) -> &Self {
        let changed = {
            let mut entries = self.inner.entries.borrow_mut();
            match entries.get_mut(key) {
                Some(entry) if *entry == value => false,
                Some(entry) => {
                    *entry = value;
                    true
                }
                None => {
                    warn!(
                        component = %self.inner.core.key(),
                        attribute = self.inner.name,
                        ?key,
                        "ignoring update for unsupported key"
                    );
                    false
                }
            }
        };
        if changed {
            self.inner.core.mark_changed();
        }
        self
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for KeyedAttribute<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedAttribute")
            .field("name", &self.inner.name)
            .field("entries", &*self.inner.entries.borrow())
            .finish()
    }
}
