//! Type-specific settings built on [`Setting`].

use std::fmt;

use super::filter::{AnyValue, Availability, Bounds, EnumSet, StringFormat};
use super::Setting;

/// A setting restricted to a set of supported values.
pub type EnumSetting<E> = Setting<E, EnumSet<E>>;

/// An on/off setting, always supported.
pub type BooleanSetting = Setting<bool, AnyValue>;

/// An on/off setting that the peripheral may not support at all.
pub type OptionalBooleanSetting = Setting<bool, Availability>;

/// A numeric setting restricted to an inclusive range.
pub type RangeSetting<T> = Setting<T, Bounds<T>>;

/// A free-text setting restricted by length and pattern.
pub type StringSetting = Setting<String, StringFormat>;

impl<E> Setting<E, EnumSet<E>>
where
    E: Ord + Clone + fmt::Debug + 'static,
{
    /// Values the peripheral currently supports.
    pub fn supported_values(&self) -> EnumSet<E> {
        self.with_filter(|values| values.clone())
    }

    /// Replace the supported values.
    pub fn update_supported_values(&self, values: impl IntoIterator<Item = E>) -> &Self {
        self.update_filter(EnumSet::of(values))
    }
}

impl Setting<bool, AnyValue> {
    /// Check if the setting is on.
    pub fn is_enabled(&self) -> bool {
        self.value()
    }

    /// Request the opposite of the observed value.
    pub fn toggle(&self) -> bool {
        self.set_value(!self.value())
    }
}

impl Setting<bool, Availability> {
    /// Check if the peripheral supports this setting.
    pub fn is_available(&self) -> bool {
        self.with_filter(|availability| availability.0)
    }

    /// Check if the setting is on.
    pub fn is_enabled(&self) -> bool {
        self.value()
    }

    /// Record whether the peripheral supports this setting.
    pub fn update_available(&self, available: bool) -> &Self {
        self.update_filter(Availability(available))
    }
}

impl<T> Setting<T, Bounds<T>>
where
    T: PartialOrd + Copy + fmt::Debug + 'static,
{
    /// Supported range.
    pub fn bounds(&self) -> Bounds<T> {
        self.with_filter(|bounds| *bounds)
    }

    /// Lowest supported value.
    pub fn min(&self) -> T {
        self.bounds().min
    }

    /// Highest supported value.
    pub fn max(&self) -> T {
        self.bounds().max
    }

    /// Replace the supported range.
    pub fn update_bounds(&self, min: T, max: T) -> &Self {
        self.update_filter(Bounds::new(min, max))
    }
}

impl Setting<String, StringFormat> {
    /// Replace the accepted format.
    pub fn update_format(&self, format: StringFormat) -> &Self {
        self.update_filter(format)
    }
}
