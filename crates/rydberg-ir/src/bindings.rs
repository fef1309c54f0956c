//! Variable bindings used to evaluate and assign symbolic expressions.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};

/// The value bound to a variable name.
///
/// Scalar variables appear inside [`Scalar`](crate::Scalar) expressions;
/// vector variables name the coefficient lists of run-time vector spatial
/// modulations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A single decimal value.
    Scalar(Decimal),
    /// An ordered list of decimal values.
    Vector(Vec<Decimal>),
}

impl ParamValue {
    /// Return the scalar value, if this is one.
    pub fn as_scalar(&self) -> Option<Decimal> {
        match self {
            ParamValue::Scalar(v) => Some(*v),
            ParamValue::Vector(_) => None,
        }
    }

    /// Return the vector value, if this is one.
    pub fn as_vector(&self) -> Option<&[Decimal]> {
        match self {
            ParamValue::Scalar(_) => None,
            ParamValue::Vector(v) => Some(v),
        }
    }
}

impl From<Decimal> for ParamValue {
    fn from(value: Decimal) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Scalar(Decimal::from(value))
    }
}

impl From<Vec<Decimal>> for ParamValue {
    fn from(value: Vec<Decimal>) -> Self {
        ParamValue::Vector(value)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Scalar(v) => write!(f, "{v}"),
            ParamValue::Vector(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A mapping from variable name to bound value.
///
/// Names are kept ordered so that iteration, serialization and error
/// reports are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bindings {
    values: BTreeMap<String, ParamValue>,
}

impl Bindings {
    /// Create an empty set of bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, failing if it already has a value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> IrResult<()> {
        let name = name.into();
        if let Some(previous) = self.values.get(&name) {
            return Err(IrError::DuplicateAssignment {
                previous: previous.as_scalar(),
                name,
            });
        }
        self.values.insert(name, value.into());
        Ok(())
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> IrResult<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// Get the raw value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Get the scalar bound to `name`.
    pub fn scalar(&self, name: &str) -> IrResult<Decimal> {
        match self.values.get(name) {
            Some(ParamValue::Scalar(v)) => Ok(*v),
            Some(ParamValue::Vector(_)) => Err(IrError::TypeMismatch {
                name: name.to_string(),
                expected: "scalar",
            }),
            None => Err(IrError::UnboundVariable(name.to_string())),
        }
    }

    /// Get the vector bound to `name`.
    pub fn vector(&self, name: &str) -> IrResult<&[Decimal]> {
        match self.values.get(name) {
            Some(ParamValue::Vector(v)) => Ok(v),
            Some(ParamValue::Scalar(_)) => Err(IrError::TypeMismatch {
                name: name.to_string(),
                expected: "vector",
            }),
            None => Err(IrError::UnboundVariable(name.to_string())),
        }
    }

    /// Check whether `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Merge another set of bindings into a new one; names must not overlap.
    pub fn merged(&self, other: &Bindings) -> IrResult<Bindings> {
        let mut merged = self.clone();
        for (name, value) in &other.values {
            merged.insert(name.clone(), value.clone())?;
        }
        Ok(merged)
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate over bound names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, ParamValue)> for Bindings {
    /// Collect pairs; later duplicates replace earlier ones.
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insert_and_lookup() {
        let mut b = Bindings::new();
        b.insert("x", dec!(1.5)).unwrap();
        b.insert("v", vec![dec!(1), dec!(2)]).unwrap();

        assert_eq!(b.scalar("x").unwrap(), dec!(1.5));
        assert_eq!(b.vector("v").unwrap(), &[dec!(1), dec!(2)]);
        assert!(matches!(b.scalar("v"), Err(IrError::TypeMismatch { .. })));
        assert!(matches!(b.scalar("y"), Err(IrError::UnboundVariable(_))));
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut b = Bindings::new();
        b.insert("x", dec!(1)).unwrap();
        let err = b.insert("x", dec!(2)).unwrap_err();
        assert_eq!(
            err,
            IrError::DuplicateAssignment {
                name: "x".into(),
                previous: Some(dec!(1)),
            }
        );
    }

    #[test]
    fn test_merge_overlap_rejected() {
        let a = Bindings::new().with("x", dec!(1)).unwrap();
        let b = Bindings::new().with("y", dec!(2)).unwrap();
        let merged = a.merged(&b).unwrap();
        assert_eq!(merged.len(), 2);
        assert!(merged.merged(&a).is_err());
    }

    #[test]
    fn test_json_shape() {
        let b = Bindings::new()
            .with("x", dec!(0.5))
            .unwrap()
            .with("v", vec![dec!(1)])
            .unwrap();
        let json = serde_json::to_string(&b).unwrap();
        let back: Bindings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }
}
