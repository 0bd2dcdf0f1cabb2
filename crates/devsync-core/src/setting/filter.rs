//! Capability filters for single-valued settings.

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;

use super::CapabilityFilter;

/// Admits every value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnyValue;

impl<T> CapabilityFilter<T> for AnyValue {
    fn admits(&self, _value: &T) -> bool {
        true
    }
}

/// Admits the members of a set.
///
/// Iteration follows the `Ord` order of the values, so supported values are
/// always listed the same way regardless of how the peripheral reported them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSet<E: Ord>(BTreeSet<E>);

impl<E: Ord> EnumSet<E> {
    /// An empty set, admitting nothing.
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// A set of the given values.
    pub fn of(values: impl IntoIterator<Item = E>) -> Self {
        Self(values.into_iter().collect())
    }

    /// Check if `value` is a member.
    pub fn contains(&self, value: &E) -> bool {
        self.0.contains(value)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the set admits nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over members in order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.0.iter()
    }

    /// Smallest member.
    pub fn first(&self) -> Option<&E> {
        self.0.iter().next()
    }

    /// Borrow the underlying set.
    pub fn as_set(&self) -> &BTreeSet<E> {
        &self.0
    }
}

impl<E: Ord> Default for EnumSet<E> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<E: Ord> FromIterator<E> for EnumSet<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self::of(iter)
    }
}

impl<E: Ord> From<BTreeSet<E>> for EnumSet<E> {
    fn from(set: BTreeSet<E>) -> Self {
        Self(set)
    }
}

impl<E: Ord> CapabilityFilter<E> for EnumSet<E> {
    fn admits(&self, value: &E) -> bool {
        self.0.contains(value)
    }
}

/// Admits values within an inclusive range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    /// Range from `min` to `max`, both inclusive.
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// Check if `value` lies within the range.
    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }
}

impl<T: PartialOrd + Copy> CapabilityFilter<T> for Bounds<T> {
    fn admits(&self, value: &T) -> bool {
        self.contains(*value)
    }
}

/// Admits every value while the feature is available, nothing otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Availability(pub bool);

impl<T> CapabilityFilter<T> for Availability {
    fn admits(&self, _value: &T) -> bool {
        self.0
    }
}

/// Admits strings up to a maximum length, optionally matching a pattern.
#[derive(Clone, Default)]
pub struct StringFormat {
    max_len: Option<usize>,
    pattern: Option<Regex>,
}

impl StringFormat {
    /// Admit any string.
    pub fn any() -> Self {
        Self::default()
    }

    /// Limit the length, in characters.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Require `pattern` to match. Anchor it (`^...$`) to constrain the
    /// whole string.
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Maximum length, if limited.
    pub fn max_len(&self) -> Option<usize> {
        self.max_len
    }

    /// Check if `value` is acceptable.
    pub fn accepts(&self, value: &str) -> bool {
        if let Some(max_len) = self.max_len {
            if value.chars().count() > max_len {
                return false;
            }
        }
        self.pattern
            .as_ref()
            .map_or(true, |pattern| pattern.is_match(value))
    }
}

impl PartialEq for StringFormat {
    fn eq(&self, other: &Self) -> bool {
        self.max_len == other.max_len
            && self.pattern.as_ref().map(Regex::as_str) == other.pattern.as_ref().map(Regex::as_str)
    }
}

impl fmt::Debug for StringFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringFormat")
            .field("max_len", &self.max_len)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .finish()
    }
}

impl CapabilityFilter<String> for StringFormat {
    fn admits(&self, value: &String) -> bool {
        self.accepts(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_set_order_and_membership() {
        let set = EnumSet::of([3, 1, 2, 1]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(set.first(), Some(&1));
        assert!(set.admits(&2));
        assert!(!set.admits(&4));
        assert!(!EnumSet::<u8>::empty().admits(&0));
    }

    #[test]
    fn test_bounds_inclusive() {
        let bounds = Bounds::new(1.0, 10.0);
        assert!(bounds.admits(&1.0));
        assert!(bounds.admits(&10.0));
        assert!(!bounds.admits(&10.5));
        assert!(!bounds.admits(&0.0));
    }

    #[test]
    fn test_string_format() {
        let format = StringFormat::any()
            .with_max_len(8)
            .with_pattern(Regex::new("^[a-z]+$").unwrap());

        assert!(format.accepts("abc"));
        assert!(!format.accepts("abc1"));
        assert!(!format.accepts("abcdefghi"));
        assert!(StringFormat::any().accepts(""));
    }

    #[test]
    fn test_string_format_equality_uses_pattern_text() {
        let a = StringFormat::any().with_pattern(Regex::new("x+").unwrap());
        let b = StringFormat::any().with_pattern(Regex::new("x+").unwrap());
        assert_eq!(a, b);
        assert_ne!(a, StringFormat::any());
    }
}
