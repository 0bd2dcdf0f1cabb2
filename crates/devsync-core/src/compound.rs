//! Compound settings: several correlated fields behind one request.
//!
//! A compound setting is a plain [`Setting`] whose value is a tuple-like
//! struct and whose filter is a [`CapabilityTable`]. Each row of the table
//! describes one family of legal combinations, typically all the
//! resolutions and framerates available in one mode. A tuple is legal when
//! at least one row admits it.
//!
//! Field setters go through [`Setting::modify`], so the backend always
//! receives the whole tuple and the whole tuple shares one rollback timer.

use std::collections::BTreeSet;
use std::fmt;

use crate::setting::{CapabilityFilter, EnumSet, Setting};

/// One family of legal combinations for a compound value `S`.
pub trait Row<S> {
    /// Check if this row allows `value`.
    fn admits(&self, value: &S) -> bool;
}

/// Backend-supplied list of capability rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityTable<R> {
    rows: Vec<R>,
}

impl<R> CapabilityTable<R> {
    /// A table with the given rows.
    pub fn new(rows: impl IntoIterator<Item = R>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
        }
    }

    /// A table with no rows, admitting nothing.
    pub fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Union of one field's values over the rows matching `select`.
    ///
    /// This is how a governing field narrows its dependents: select the rows
    /// that contain the current mode, then collect their resolutions.
    pub fn collect<V, S, P>(&self, select: S, field: P) -> EnumSet<V>
    where
        V: Ord + Clone,
        S: Fn(&R) -> bool,
        P: Fn(&R) -> &BTreeSet<V>,
    {
        self.rows
            .iter()
            .filter(|row| select(*row))
            .flat_map(|row| field(row).iter().cloned())
            .collect()
    }

    /// Check if any row matches `predicate`.
    pub fn any(&self, predicate: impl Fn(&R) -> bool) -> bool {
        self.rows.iter().any(predicate)
    }
}

impl<R> Default for CapabilityTable<R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S, R: Row<S>> CapabilityFilter<S> for CapabilityTable<R> {
    fn admits(&self, value: &S) -> bool {
        self.rows.iter().any(|row| row.admits(value))
    }
}

/// A multi-field setting validated against a capability table.
pub type CompoundSetting<S, R> = Setting<S, CapabilityTable<R>>;

impl<S, R> Setting<S, CapabilityTable<R>>
where
    S: Clone + PartialEq + fmt::Debug + 'static,
    R: Row<S> + Clone + PartialEq + 'static,
{
    /// Current capability table.
    pub fn capabilities(&self) -> CapabilityTable<R> {
        self.with_filter(|table| table.clone())
    }

    /// Replace the capability table.
    ///
    /// The observed combination is left as is even if no row admits it any
    /// more; only later requests are checked against the new table.
    pub fn update_capabilities(&self, rows: impl IntoIterator<Item = R>) -> &Self {
        self.update_filter(CapabilityTable::new(rows))
    }
}

/// Keep `current` if it is legal, else fall back to the smallest legal value.
pub fn fit<V: Ord + Clone>(current: &V, legal: &EnumSet<V>) -> Option<V> {
    if legal.contains(current) {
        Some(current.clone())
    } else {
        legal.first().cloned()
    }
}
