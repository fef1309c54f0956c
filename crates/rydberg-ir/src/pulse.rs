//! Pulses: fields keyed by field name, with composition nodes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::arith;
use crate::bindings::Bindings;
use crate::error::{IrError, IrResult};
use crate::field::{Field, FieldName};
use crate::scalar::Interval;

/// A set of fields played together, or a composition of pulses.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Pulse(Arc<PulseKind>);

/// The node kinds of a [`Pulse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PulseKind {
    /// Fields played in parallel.
    Fields(BTreeMap<FieldName, Field>),
    /// Pulses played one after another. Never empty, never nested.
    Append(Vec<Pulse>),
    /// A time window of a pulse.
    Slice {
        /// The sliced pulse.
        pulse: Pulse,
        /// The window.
        interval: Interval,
    },
    /// A labelled pulse.
    Named {
        /// The labelled pulse.
        pulse: Pulse,
        /// The label.
        name: String,
    },
}

impl Pulse {
    fn from_kind(kind: PulseKind) -> Self {
        Pulse(Arc::new(kind))
    }

    /// A pulse from a field map.
    pub fn new(fields: BTreeMap<FieldName, Field>) -> Self {
        Self::from_kind(PulseKind::Fields(fields))
    }

    /// A pulse with a single field.
    pub fn from_field(name: FieldName, field: Field) -> Self {
        Self::new(BTreeMap::from([(name, field)]))
    }

    /// Add `field` under `name`, summing with an existing field.
    ///
    /// Fails with [`IrError::InvalidArgument`] on composite pulses.
    pub fn with_field(&self, name: FieldName, field: Field) -> IrResult<Pulse> {
        match self.kind() {
            PulseKind::Fields(fields) => {
                let mut fields = fields.clone();
                let merged = match fields.remove(&name) {
                    Some(existing) => existing.add(&field),
                    None => field,
                };
                fields.insert(name, merged);
                Ok(Pulse::new(fields))
            }
            _ => Err(IrError::InvalidArgument(format!(
                "cannot add a {name} field to a composite pulse"
            ))),
        }
    }

    /// Access the node kind for pattern matching.
    pub fn kind(&self) -> &PulseKind {
        &self.0
    }

    /// The field named `name` of a [`PulseKind::Fields`] node.
    pub fn field(&self, name: FieldName) -> Option<&Field> {
        match self.kind() {
            PulseKind::Fields(fields) => fields.get(&name),
            _ => None,
        }
    }

    /// Play `other` after `self`.
    pub fn append(&self, other: &Pulse) -> Pulse {
        let mut parts = Vec::new();
        for pulse in [self, other] {
            match pulse.kind() {
                PulseKind::Append(children) => parts.extend(children.iter().cloned()),
                _ => parts.push(pulse.clone()),
            }
        }
        Self::from_kind(PulseKind::Append(parts))
    }

    /// Play all `pulses` in order.
    pub fn concat<I: IntoIterator<Item = Pulse>>(pulses: I) -> IrResult<Pulse> {
        let mut iter = pulses.into_iter();
        let first = iter.next().ok_or(IrError::EmptyAppend)?;
        Ok(iter.fold(first, |acc, p| acc.append(&p)))
    }

    /// Cut out `interval`.
    pub fn slice(&self, interval: Interval) -> Pulse {
        Self::from_kind(PulseKind::Slice {
            pulse: self.clone(),
            interval,
        })
    }

    /// Attach a label.
    pub fn named(&self, name: impl Into<String>) -> Pulse {
        Self::from_kind(PulseKind::Named {
            pulse: self.clone(),
            name: name.into(),
        })
    }

    /// Duration under `bindings`; parallel fields last as long as the longest.
    pub fn duration(&self, bindings: &Bindings) -> IrResult<Decimal> {
        match self.kind() {
            PulseKind::Fields(fields) => fields
                .values()
                .try_fold(Decimal::ZERO, |acc, f| Ok(acc.max(f.duration(bindings)?))),
            PulseKind::Append(parts) => parts.iter().try_fold(Decimal::ZERO, |acc, p| {
                arith::add(acc, p.duration(bindings)?)
            }),
            PulseKind::Slice { pulse, interval } => {
                let (start, stop) = interval.resolve(pulse.duration(bindings)?, bindings)?;
                arith::sub(stop, start)
            }
            PulseKind::Named { pulse, .. } => pulse.duration(bindings),
        }
    }

    /// Assign variables throughout the tree.
    pub fn assign(&self, bindings: &Bindings) -> IrResult<Pulse> {
        if bindings.is_empty() {
            return Ok(self.clone());
        }
        Ok(match self.kind() {
            PulseKind::Fields(fields) => Pulse::new(
                fields
                    .iter()
                    .map(|(n, f)| Ok((*n, f.assign(bindings)?)))
                    .collect::<IrResult<_>>()?,
            ),
            PulseKind::Append(parts) => {
                Pulse::concat(parts.iter().map(|p| p.assign(bindings)).collect::<IrResult<Vec<_>>>()?)?
            }
            PulseKind::Slice { pulse, interval } => {
                pulse.assign(bindings)?.slice(interval.assign(bindings)?)
            }
            PulseKind::Named { pulse, name } => pulse.assign(bindings)?.named(name.clone()),
        })
    }

    /// Collect free variable names into `out`.
    pub fn collect_free(&self, out: &mut BTreeSet<String>) {
        match self.kind() {
            PulseKind::Fields(fields) => fields.values().for_each(|f| f.collect_free(out)),
            PulseKind::Append(parts) => parts.iter().for_each(|p| p.collect_free(out)),
            PulseKind::Slice { pulse, interval } => {
                pulse.collect_free(out);
                interval.collect_free(out);
            }
            PulseKind::Named { pulse, .. } => pulse.collect_free(out),
        }
    }

    /// Collect assigned variables into `out`.
    pub fn collect_assigned(&self, out: &mut BTreeMap<String, Decimal>) {
        match self.kind() {
            PulseKind::Fields(fields) => fields.values().for_each(|f| f.collect_assigned(out)),
            PulseKind::Append(parts) => parts.iter().for_each(|p| p.collect_assigned(out)),
            PulseKind::Slice { pulse, interval } => {
                pulse.collect_assigned(out);
                interval.collect_assigned(out);
            }
            PulseKind::Named { pulse, .. } => pulse.collect_assigned(out),
        }
    }

    /// Collect recorded variable names into `out`.
    pub fn collect_recorded(&self, out: &mut BTreeSet<String>) {
        match self.kind() {
            PulseKind::Fields(fields) => fields.values().for_each(|f| f.collect_recorded(out)),
            PulseKind::Append(parts) => parts.iter().for_each(|p| p.collect_recorded(out)),
            PulseKind::Slice { pulse, .. } | PulseKind::Named { pulse, .. } => {
                pulse.collect_recorded(out);
            }
        }
    }

    /// Resolve record captures; appended pulses are scanned in playback order.
    pub fn scan_records(&self, acc: Bindings) -> IrResult<Bindings> {
        match self.kind() {
            PulseKind::Fields(fields) => fields.values().try_fold(acc, |acc, f| f.scan_records(acc)),
            PulseKind::Append(parts) => parts.iter().try_fold(acc, |acc, p| p.scan_records(acc)),
            PulseKind::Slice { pulse, .. } | PulseKind::Named { pulse, .. } => pulse.scan_records(acc),
        }
    }

    /// Collect the field names used anywhere in the tree.
    pub fn collect_field_names(&self, out: &mut BTreeSet<FieldName>) {
        match self.kind() {
            PulseKind::Fields(fields) => out.extend(fields.keys().copied()),
            PulseKind::Append(parts) => parts.iter().for_each(|p| p.collect_field_names(out)),
            PulseKind::Slice { pulse, .. } | PulseKind::Named { pulse, .. } => {
                pulse.collect_field_names(out);
            }
        }
    }
}

impl fmt::Debug for Pulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pulse({self})")
    }
}

impl fmt::Display for Pulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            PulseKind::Fields(fields) => {
                write!(f, "pulse{{")?;
                for (i, (name, field)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {field}")?;
                }
                write!(f, "}}")
            }
            PulseKind::Append(parts) => {
                write!(f, "append(")?;
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
            PulseKind::Slice { pulse, interval } => write!(f, "{pulse}{interval}"),
            PulseKind::Named { pulse, name } => write!(f, "{name}: {pulse}"),
        }
    }
}
