//! Symbolic scalar expressions with exact decimal evaluation.
//!
//! A [`Scalar`] is an immutable, reference-counted expression tree. Cloning
//! is cheap and never copies the tree. Constructors canonicalize eagerly:
//! literal operands are folded and neutral elements dropped, so two
//! expressions built the same way compare equal.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::arith;
use crate::bindings::{Bindings, ParamValue};
use crate::error::{IrError, IrResult};

/// A symbolic or concrete scalar expression.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scalar(Arc<ScalarKind>);

/// The node kinds of a [`Scalar`] expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    /// A decimal constant.
    Literal(Decimal),
    /// A free, named variable.
    Variable(String),
    /// A variable that received its value through assignment.
    ///
    /// This is the terminal form of a variable: it is never substituted again.
    AssignedVariable {
        /// Name of the variable.
        name: String,
        /// The value it was assigned.
        value: Decimal,
    },
    /// Negation.
    Negative(Scalar),
    /// Addition.
    Add(Scalar, Scalar),
    /// Multiplication.
    Mul(Scalar, Scalar),
    /// Division.
    Div(Scalar, Scalar),
    /// Minimum of two operands.
    Min(Scalar, Scalar),
    /// Maximum of two operands.
    Max(Scalar, Scalar),
    /// Length of `interval` cut out of the range `[0, expr]`.
    Slice {
        /// The full length being sliced.
        expr: Scalar,
        /// The sub-range.
        interval: Interval,
    },
}

/// A sub-range of a time axis.
///
/// A missing `start` means 0; a missing `stop` means the full duration of
/// the operand the interval is applied to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval {
    /// Start of the interval.
    pub start: Option<Scalar>,
    /// Stop of the interval.
    pub stop: Option<Scalar>,
}

impl Interval {
    /// Create an interval from optional bounds.
    pub fn new(start: Option<Scalar>, stop: Option<Scalar>) -> Self {
        Self { start, stop }
    }

    /// `[start, stop]`.
    pub fn between(start: impl Into<Scalar>, stop: impl Into<Scalar>) -> Self {
        Self::new(Some(start.into()), Some(stop.into()))
    }

    /// `[start, end of operand]`.
    pub fn from_start(start: impl Into<Scalar>) -> Self {
        Self::new(Some(start.into()), None)
    }

    /// `[0, stop]`.
    pub fn until(stop: impl Into<Scalar>) -> Self {
        Self::new(None, Some(stop.into()))
    }

    /// Resolve against an operand of the given duration.
    ///
    /// Fails with [`IrError::InvalidSlice`] unless `0 <= start <= stop <= duration`.
    pub fn resolve(&self, duration: Decimal, bindings: &Bindings) -> IrResult<(Decimal, Decimal)> {
        let start = match &self.start {
            Some(s) => s.evaluate(bindings)?,
            None => Decimal::ZERO,
        };
        let stop = match &self.stop {
            Some(s) => s.evaluate(bindings)?,
            None => duration,
        };
        if start < Decimal::ZERO || stop < start || stop > duration {
            return Err(IrError::InvalidSlice {
                start,
                stop,
                duration,
            });
        }
        Ok((start, stop))
    }

    /// Assign variables in both bounds.
    pub fn assign(&self, bindings: &Bindings) -> IrResult<Interval> {
        Ok(Interval {
            start: self.start.as_ref().map(|s| s.assign(bindings)).transpose()?,
            stop: self.stop.as_ref().map(|s| s.assign(bindings)).transpose()?,
        })
    }

    /// Collect the free variable names of both bounds.
    pub fn collect_free(&self, out: &mut BTreeSet<String>) {
        for bound in self.start.iter().chain(self.stop.iter()) {
            bound.collect_free(out);
        }
    }

    pub(crate) fn collect_assigned(&self, out: &mut BTreeMap<String, Decimal>) {
        for bound in self.start.iter().chain(self.stop.iter()) {
            bound.collect_assigned(out);
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.start {
            Some(s) => write!(f, "[{s}:")?,
            None => write!(f, "[:")?,
        }
        match &self.stop {
            Some(s) => write!(f, "{s}]"),
            None => write!(f, "]"),
        }
    }
}

impl Scalar {
    fn from_kind(kind: ScalarKind) -> Self {
        Scalar(Arc::new(kind))
    }

    /// A literal constant.
    pub fn literal(value: Decimal) -> Self {
        Self::from_kind(ScalarKind::Literal(value))
    }

    /// The literal zero.
    pub fn zero() -> Self {
        Self::literal(Decimal::ZERO)
    }

    /// A free variable.
    pub fn var(name: impl Into<String>) -> Self {
        Self::from_kind(ScalarKind::Variable(name.into()))
    }

    /// A variable that already carries a value.
    pub fn assigned(name: impl Into<String>, value: Decimal) -> Self {
        Self::from_kind(ScalarKind::AssignedVariable {
            name: name.into(),
            value,
        })
    }

    /// Access the node kind for pattern matching.
    pub fn kind(&self) -> &ScalarKind {
        &self.0
    }

    /// The value of a [`ScalarKind::Literal`] node.
    pub fn as_literal(&self) -> Option<Decimal> {
        match self.kind() {
            ScalarKind::Literal(v) => Some(*v),
            _ => None,
        }
    }

    fn is_literal(&self, value: Decimal) -> bool {
        self.as_literal() == Some(value)
    }

    /// Negate, collapsing double negation.
    pub fn neg(&self) -> Scalar {
        match self.kind() {
            ScalarKind::Literal(v) => Scalar::literal(-*v),
            ScalarKind::Negative(inner) => inner.clone(),
            _ => Self::from_kind(ScalarKind::Negative(self.clone())),
        }
    }

    /// `self + rhs`.
    pub fn add(&self, rhs: &Scalar) -> Scalar {
        if let (Some(a), Some(b)) = (self.as_literal(), rhs.as_literal()) {
            if let Some(sum) = a.checked_add(b) {
                return Scalar::literal(sum);
            }
        }
        if self.is_literal(Decimal::ZERO) {
            return rhs.clone();
        }
        if rhs.is_literal(Decimal::ZERO) {
            return self.clone();
        }
        Self::from_kind(ScalarKind::Add(self.clone(), rhs.clone()))
    }

    /// `self - rhs`.
    pub fn sub(&self, rhs: &Scalar) -> Scalar {
        self.add(&rhs.neg())
    }

    /// `self * rhs`.
    pub fn mul(&self, rhs: &Scalar) -> Scalar {
        if let (Some(a), Some(b)) = (self.as_literal(), rhs.as_literal()) {
            if let Some(product) = a.checked_mul(b) {
                return Scalar::literal(product);
            }
        }
        if self.is_literal(Decimal::ONE) {
            return rhs.clone();
        }
        if rhs.is_literal(Decimal::ONE) {
            return self.clone();
        }
        Self::from_kind(ScalarKind::Mul(self.clone(), rhs.clone()))
    }

    /// `self / rhs`.
    pub fn div(&self, rhs: &Scalar) -> Scalar {
        if let (Some(a), Some(b)) = (self.as_literal(), rhs.as_literal()) {
            if let Some(quotient) = a.checked_div(b) {
                return Scalar::literal(quotient);
            }
        }
        if rhs.is_literal(Decimal::ONE) {
            return self.clone();
        }
        Self::from_kind(ScalarKind::Div(self.clone(), rhs.clone()))
    }

    /// `min(self, rhs)`.
    pub fn minimum(&self, rhs: &Scalar) -> Scalar {
        match (self.as_literal(), rhs.as_literal()) {
            (Some(a), Some(b)) => Scalar::literal(a.min(b)),
            _ if self == rhs => self.clone(),
            _ => Self::from_kind(ScalarKind::Min(self.clone(), rhs.clone())),
        }
    }

    /// `max(self, rhs)`.
    pub fn maximum(&self, rhs: &Scalar) -> Scalar {
        match (self.as_literal(), rhs.as_literal()) {
            (Some(a), Some(b)) => Scalar::literal(a.max(b)),
            _ if self == rhs => self.clone(),
            _ => Self::from_kind(ScalarKind::Max(self.clone(), rhs.clone())),
        }
    }

    /// The length of `interval` applied to the range `[0, self]`.
    pub fn slice(&self, interval: Interval) -> Scalar {
        if interval.start.is_none() && interval.stop.is_none() {
            return self.clone();
        }
        Self::from_kind(ScalarKind::Slice {
            expr: self.clone(),
            interval,
        })
    }

    /// Evaluate under `bindings`.
    ///
    /// Assigned variables evaluate to their own value; free variables are
    /// looked up in `bindings` and fail with [`IrError::UnboundVariable`]
    /// when absent.
    pub fn evaluate(&self, bindings: &Bindings) -> IrResult<Decimal> {
        match self.kind() {
            ScalarKind::Literal(v) => Ok(*v),
            ScalarKind::Variable(name) => bindings.scalar(name),
            ScalarKind::AssignedVariable { value, .. } => Ok(*value),
            ScalarKind::Negative(inner) => Ok(-inner.evaluate(bindings)?),
            ScalarKind::Add(a, b) => a
                .evaluate(bindings)?
                .checked_add(b.evaluate(bindings)?)
                .ok_or_else(|| IrError::ArithmeticOverflow(self.to_string())),
            ScalarKind::Mul(a, b) => a
                .evaluate(bindings)?
                .checked_mul(b.evaluate(bindings)?)
                .ok_or_else(|| IrError::ArithmeticOverflow(self.to_string())),
            ScalarKind::Div(a, b) => {
                let divisor = b.evaluate(bindings)?;
                if divisor.is_zero() {
                    return Err(IrError::DivisionByZero(self.to_string()));
                }
                a.evaluate(bindings)?
                    .checked_div(divisor)
                    .ok_or_else(|| IrError::ArithmeticOverflow(self.to_string()))
            }
            ScalarKind::Min(a, b) => Ok(a.evaluate(bindings)?.min(b.evaluate(bindings)?)),
            ScalarKind::Max(a, b) => Ok(a.evaluate(bindings)?.max(b.evaluate(bindings)?)),
            ScalarKind::Slice { expr, interval } => {
                let (start, stop) = interval.resolve(expr.evaluate(bindings)?, bindings)?;
                arith::sub(stop, start)
            }
        }
    }

    /// Evaluate to a literal node.
    pub fn literalize(&self, bindings: &Bindings) -> IrResult<Scalar> {
        match self.kind() {
            ScalarKind::Literal(_) => Ok(self.clone()),
            _ => Ok(Scalar::literal(self.evaluate(bindings)?)),
        }
    }

    /// Replace every free variable bound in `bindings` by an assigned variable.
    ///
    /// Fails with [`IrError::DuplicateAssignment`] when `bindings` names a
    /// variable that is already assigned in this expression.
    pub fn assign(&self, bindings: &Bindings) -> IrResult<Scalar> {
        if bindings.is_empty() {
            return Ok(self.clone());
        }
        Ok(match self.kind() {
            ScalarKind::Literal(_) => self.clone(),
            ScalarKind::Variable(name) => match bindings.get(name) {
                Some(ParamValue::Scalar(value)) => Scalar::assigned(name.clone(), *value),
                Some(ParamValue::Vector(_)) => {
                    return Err(IrError::TypeMismatch {
                        name: name.clone(),
                        expected: "scalar",
                    });
                }
                None => self.clone(),
            },
            ScalarKind::AssignedVariable { name, value } => {
                if bindings.contains(name) {
                    return Err(IrError::DuplicateAssignment {
                        name: name.clone(),
                        previous: Some(*value),
                    });
                }
                self.clone()
            }
            ScalarKind::Negative(inner) => inner.assign(bindings)?.neg(),
            ScalarKind::Add(a, b) => a.assign(bindings)?.add(&b.assign(bindings)?),
            ScalarKind::Mul(a, b) => a.assign(bindings)?.mul(&b.assign(bindings)?),
            ScalarKind::Div(a, b) => a.assign(bindings)?.div(&b.assign(bindings)?),
            ScalarKind::Min(a, b) => a.assign(bindings)?.minimum(&b.assign(bindings)?),
            ScalarKind::Max(a, b) => a.assign(bindings)?.maximum(&b.assign(bindings)?),
            ScalarKind::Slice { expr, interval } => {
                expr.assign(bindings)?.slice(interval.assign(bindings)?)
            }
        })
    }

    /// Whether the expression contains no free variables.
    pub fn is_assigned(&self) -> bool {
        self.free_variables().is_empty()
    }

    /// All free variable names.
    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_free(&mut out);
        out
    }

    /// Collect free variable names into `out`.
    pub fn collect_free(&self, out: &mut BTreeSet<String>) {
        match self.kind() {
            ScalarKind::Literal(_) | ScalarKind::AssignedVariable { .. } => {}
            ScalarKind::Variable(name) => {
                out.insert(name.clone());
            }
            ScalarKind::Negative(inner) => inner.collect_free(out),
            ScalarKind::Add(a, b)
            | ScalarKind::Mul(a, b)
            | ScalarKind::Div(a, b)
            | ScalarKind::Min(a, b)
            | ScalarKind::Max(a, b) => {
                a.collect_free(out);
                b.collect_free(out);
            }
            ScalarKind::Slice { expr, interval } => {
                expr.collect_free(out);
                interval.collect_free(out);
            }
        }
    }

    /// All assigned variables with their values.
    pub fn assigned_variables(&self) -> BTreeMap<String, Decimal> {
        let mut out = BTreeMap::new();
        self.collect_assigned(&mut out);
        out
    }

    pub(crate) fn collect_assigned(&self, out: &mut BTreeMap<String, Decimal>) {
        match self.kind() {
            ScalarKind::Literal(_) | ScalarKind::Variable(_) => {}
            ScalarKind::AssignedVariable { name, value } => {
                out.insert(name.clone(), *value);
            }
            ScalarKind::Negative(inner) => inner.collect_assigned(out),
            ScalarKind::Add(a, b)
            | ScalarKind::Mul(a, b)
            | ScalarKind::Div(a, b)
            | ScalarKind::Min(a, b)
            | ScalarKind::Max(a, b) => {
                a.collect_assigned(out);
                b.collect_assigned(out);
            }
            ScalarKind::Slice { expr, interval } => {
                expr.collect_assigned(out);
                interval.collect_assigned(out);
            }
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for Scalar {
    type Err = IrError;

    /// Parse a decimal literal or a variable name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(value) = Decimal::from_str(s) {
            return Ok(Scalar::literal(value));
        }
        if let Ok(value) = Decimal::from_scientific(s) {
            return Ok(Scalar::literal(value));
        }
        if is_identifier(s) {
            return Ok(Scalar::var(s));
        }
        Err(IrError::InvalidArgument(format!(
            "'{s}' is neither a number nor a variable name"
        )))
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar({self})")
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ScalarKind::Literal(v) => write!(f, "{v}"),
            ScalarKind::Variable(name) => write!(f, "{name}"),
            ScalarKind::AssignedVariable { name, value } => write!(f, "{name}(={value})"),
            ScalarKind::Negative(e) => write!(f, "-({e})"),
            ScalarKind::Add(a, b) => write!(f, "({a} + {b})"),
            ScalarKind::Mul(a, b) => write!(f, "({a} * {b})"),
            ScalarKind::Div(a, b) => write!(f, "({a} / {b})"),
            ScalarKind::Min(a, b) => write!(f, "min({a}, {b})"),
            ScalarKind::Max(a, b) => write!(f, "max({a}, {b})"),
            ScalarKind::Slice { expr, interval } => write!(f, "{expr}{interval}"),
        }
    }
}

impl From<Decimal> for Scalar {
    fn from(value: Decimal) -> Self {
        Scalar::literal(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::literal(Decimal::from(value))
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::literal(Decimal::from(value))
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::literal(Decimal::from(value))
    }
}

impl From<&Scalar> for Scalar {
    fn from(value: &Scalar) -> Self {
        value.clone()
    }
}

impl std::ops::Add for Scalar {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Scalar::add(&self, &rhs)
    }
}

impl std::ops::Sub for Scalar {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Scalar::sub(&self, &rhs)
    }
}

impl std::ops::Mul for Scalar {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Scalar::mul(&self, &rhs)
    }
}

impl std::ops::Div for Scalar {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        Scalar::div(&self, &rhs)
    }
}

impl std::ops::Neg for Scalar {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Scalar::neg(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_literal_folding() {
        let a = Scalar::from(2);
        let b = Scalar::literal(dec!(0.5));
        assert_eq!((a.clone() + b.clone()).as_literal(), Some(dec!(2.5)));
        assert_eq!((a.clone() * b.clone()).as_literal(), Some(dec!(1.0)));
        assert_eq!((a.clone() / b).as_literal(), Some(dec!(4)));
        assert_eq!(a.maximum(&Scalar::from(3)).as_literal(), Some(dec!(3)));
    }

    #[test]
    fn test_neutral_elements_dropped() {
        let x = Scalar::var("x");
        assert_eq!(x.add(&Scalar::zero()), x);
        assert_eq!(Scalar::from(1).mul(&x), x);
        assert_eq!(x.div(&Scalar::from(1)), x);
    }

    #[test]
    fn test_double_negation_collapses() {
        let x = Scalar::var("x");
        assert_eq!(x.neg().neg(), x);
    }

    #[test]
    fn test_evaluate_with_bindings() {
        let expr = Scalar::var("x") * Scalar::from(3) - Scalar::var("y");
        let b = Bindings::new()
            .with("x", dec!(2))
            .unwrap()
            .with("y", dec!(0.5))
            .unwrap();
        assert_eq!(expr.evaluate(&b).unwrap(), dec!(5.5));
    }

    #[test]
    fn test_unbound_variable() {
        let expr = Scalar::var("x") + Scalar::from(1);
        assert_eq!(
            expr.evaluate(&Bindings::new()),
            Err(IrError::UnboundVariable("x".into()))
        );
    }

    #[test]
    fn test_division_by_zero() {
        let expr = Scalar::from(1) / Scalar::var("x");
        let b = Bindings::new().with("x", dec!(0)).unwrap();
        assert!(matches!(expr.evaluate(&b), Err(IrError::DivisionByZero(_))));
    }

    #[test]
    fn test_assign_is_terminal() {
        let expr = Scalar::var("x") + Scalar::var("y");
        let b = Bindings::new().with("x", dec!(1)).unwrap();
        let assigned = expr.assign(&b).unwrap();

        assert_eq!(
            assigned.free_variables().into_iter().collect::<Vec<_>>(),
            vec!["y".to_string()]
        );
        assert_eq!(assigned.assigned_variables().get("x"), Some(&dec!(1)));

        let again = assigned.assign(&b);
        assert!(matches!(
            again,
            Err(IrError::DuplicateAssignment { ref name, .. }) if name == "x"
        ));
    }

    #[test]
    fn test_slice_length() {
        let d = Scalar::var("d");
        let sliced = d.slice(Interval::from_start(Scalar::from(1)));
        let b = Bindings::new().with("d", dec!(4)).unwrap();
        assert_eq!(sliced.evaluate(&b).unwrap(), dec!(3));
    }

    #[test]
    fn test_slice_length_rejects_bad_bounds() {
        let b = Bindings::new().with("d", dec!(4)).unwrap();
        let d = Scalar::var("d");
        for interval in [
            Interval::from_start(Scalar::from(-1)),
            Interval::between(3, 2),
            Interval::until(5),
        ] {
            let err = d.slice(interval).evaluate(&b).unwrap_err();
            assert!(matches!(err, IrError::InvalidSlice { .. }));
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "1.25".parse::<Scalar>().unwrap().as_literal(),
            Some(dec!(1.25))
        );
        assert_eq!("omega_max".parse::<Scalar>().unwrap(), Scalar::var("omega_max"));
        assert!("1x".parse::<Scalar>().is_err());
    }

    #[test]
    fn test_display() {
        let expr = Scalar::var("x") * Scalar::from(2);
        assert_eq!(expr.to_string(), "(x * 2)");
        assert_eq!(Scalar::assigned("t", dec!(1.5)).to_string(), "t(=1.5)");
    }
}
