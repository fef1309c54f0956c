//! `PropertySet` for pass communication.
//!
//! Passes share the task bindings, the target limits and the results of
//! earlier passes through a [`PropertySet`]. Besides the standard fields it
//! stores arbitrary typed values.
//!
//! # Example
//!
//! ```
//! use rydberg_compile::{PropertySet, RecordedValues};
//! use rydberg_ir::Bindings;
//! use rust_decimal::Decimal;
//!
//! let mut props = PropertySet::new()
//!     .with_bindings(Bindings::new().with("omega", Decimal::from(10)).unwrap());
//!
//! props.insert(RecordedValues(Bindings::new()));
//! assert!(props.get::<RecordedValues>().is_some());
//! assert!(props.bindings.contains("omega"));
//! ```

use std::any::{Any, TypeId};

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rydberg_hal::Capabilities;
use rydberg_ir::Bindings;

/// Values captured by record nodes during binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedValues(pub Bindings);

/// Shared state for a pass pipeline.
#[derive(Debug, Default)]
pub struct PropertySet {
    /// Values for the task: static parameters, arguments and one batch entry.
    pub bindings: Bindings,

    /// Target limits, expressed in program units.
    ///
    /// `None` for targets without hardware limits; validation passes are
    /// skipped then.
    pub capabilities: Option<Capabilities>,

    /// Total program duration, set by the normalizer.
    pub duration: Option<Decimal>,

    /// Custom properties storage (type-erased).
    custom: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PropertySet {
    /// Create a new empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the task bindings.
    #[must_use]
    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Set the target limits (in program units).
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Whether the normalizer has run.
    pub fn is_normalized(&self) -> bool {
        self.duration.is_some()
    }

    /// Insert a custom property.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.custom.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a custom property.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.custom
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Get a mutable custom property.
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.custom
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    /// Remove a custom property.
    pub fn remove<T: Any>(&mut self) -> Option<T> {
        self.custom
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|v| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::items_after_statements)]
    fn test_property_set_custom() {
        let mut props = PropertySet::new();

        #[derive(Debug, PartialEq)]
        struct CustomData(i32);

        props.insert(CustomData(42));
        assert_eq!(props.get::<CustomData>(), Some(&CustomData(42)));

        if let Some(data) = props.get_mut::<CustomData>() {
            data.0 = 7;
        }
        let removed = props.remove::<CustomData>();
        assert_eq!(removed, Some(CustomData(7)));
        assert_eq!(props.get::<CustomData>(), None);
    }

    #[test]
    fn test_with_capabilities() {
        let props = PropertySet::new().with_capabilities(Capabilities::aquila());
        assert!(props.capabilities.is_some());
        assert!(!props.is_normalized());
    }
}
