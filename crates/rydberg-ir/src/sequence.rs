//! Sequences: pulses keyed by level coupling, with composition nodes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::arith;
use crate::bindings::Bindings;
use crate::error::{IrError, IrResult};
use crate::pulse::Pulse;
use crate::scalar::Interval;

/// The atomic transition a pulse addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelCoupling {
    /// Ground to Rydberg state.
    GroundRydberg,
    /// Between the hyperfine ground states.
    Hyperfine,
}

impl fmt::Display for LevelCoupling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelCoupling::GroundRydberg => f.write_str("rydberg"),
            LevelCoupling::Hyperfine => f.write_str("hyperfine"),
        }
    }
}

/// Pulses on one or more level couplings, or a composition of sequences.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Sequence(Arc<SequenceKind>);

/// The node kinds of a [`Sequence`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    /// Pulses played in parallel on their couplings.
    Pulses(BTreeMap<LevelCoupling, Pulse>),
    /// Sequences played one after another. Never empty, never nested.
    Append(Vec<Sequence>),
    /// A time window of a sequence.
    Slice {
        /// The sliced sequence.
        sequence: Sequence,
        /// The window.
        interval: Interval,
    },
    /// A labelled sequence.
    Named {
        /// The labelled sequence.
        sequence: Sequence,
        /// The label.
        name: String,
    },
}

impl Sequence {
    fn from_kind(kind: SequenceKind) -> Self {
        Sequence(Arc::new(kind))
    }

    /// A sequence from a pulse map.
    pub fn new(pulses: BTreeMap<LevelCoupling, Pulse>) -> Self {
        Self::from_kind(SequenceKind::Pulses(pulses))
    }

    /// A sequence driving a single coupling.
    pub fn from_pulse(coupling: LevelCoupling, pulse: Pulse) -> Self {
        Self::new(BTreeMap::from([(coupling, pulse)]))
    }

    /// Access the node kind for pattern matching.
    pub fn kind(&self) -> &SequenceKind {
        &self.0
    }

    /// The pulse on `coupling` of a [`SequenceKind::Pulses`] node.
    pub fn pulse(&self, coupling: LevelCoupling) -> Option<&Pulse> {
        match self.kind() {
            SequenceKind::Pulses(pulses) => pulses.get(&coupling),
            _ => None,
        }
    }

    /// Play `other` after `self`.
    pub fn append(&self, other: &Sequence) -> Sequence {
        let mut parts = Vec::new();
        for sequence in [self, other] {
            match sequence.kind() {
                SequenceKind::Append(children) => parts.extend(children.iter().cloned()),
                _ => parts.push(sequence.clone()),
            }
        }
        Self::from_kind(SequenceKind::Append(parts))
    }

    /// Play all `sequences` in order.
    pub fn concat<I: IntoIterator<Item = Sequence>>(sequences: I) -> IrResult<Sequence> {
        let mut iter = sequences.into_iter();
        let first = iter.next().ok_or(IrError::EmptyAppend)?;
        Ok(iter.fold(first, |acc, s| acc.append(&s)))
    }

    /// Cut out `interval`.
    pub fn slice(&self, interval: Interval) -> Sequence {
        Self::from_kind(SequenceKind::Slice {
            sequence: self.clone(),
            interval,
        })
    }

    /// Attach a label.
    pub fn named(&self, name: impl Into<String>) -> Sequence {
        Self::from_kind(SequenceKind::Named {
            sequence: self.clone(),
            name: name.into(),
        })
    }

    /// Duration under `bindings`; parallel couplings last as long as the longest.
    pub fn duration(&self, bindings: &Bindings) -> IrResult<Decimal> {
        match self.kind() {
            SequenceKind::Pulses(pulses) => pulses
                .values()
                .try_fold(Decimal::ZERO, |acc, p| Ok(acc.max(p.duration(bindings)?))),
            SequenceKind::Append(parts) => parts.iter().try_fold(Decimal::ZERO, |acc, s| {
                arith::add(acc, s.duration(bindings)?)
            }),
            SequenceKind::Slice { sequence, interval } => {
                let (start, stop) = interval.resolve(sequence.duration(bindings)?, bindings)?;
                arith::sub(stop, start)
            }
            SequenceKind::Named { sequence, .. } => sequence.duration(bindings),
        }
    }

    /// Assign variables throughout the tree.
    pub fn assign(&self, bindings: &Bindings) -> IrResult<Sequence> {
        if bindings.is_empty() {
            return Ok(self.clone());
        }
        Ok(match self.kind() {
            SequenceKind::Pulses(pulses) => Sequence::new(
                pulses
                    .iter()
                    .map(|(c, p)| Ok((*c, p.assign(bindings)?)))
                    .collect::<IrResult<_>>()?,
            ),
            SequenceKind::Append(parts) => Sequence::concat(
                parts
                    .iter()
                    .map(|s| s.assign(bindings))
                    .collect::<IrResult<Vec<_>>>()?,
            )?,
            SequenceKind::Slice { sequence, interval } => {
                sequence.assign(bindings)?.slice(interval.assign(bindings)?)
            }
            SequenceKind::Named { sequence, name } => sequence.assign(bindings)?.named(name.clone()),
        })
    }

    /// Collect free variable names into `out`.
    pub fn collect_free(&self, out: &mut BTreeSet<String>) {
        match self.kind() {
            SequenceKind::Pulses(pulses) => pulses.values().for_each(|p| p.collect_free(out)),
            SequenceKind::Append(parts) => parts.iter().for_each(|s| s.collect_free(out)),
            SequenceKind::Slice { sequence, interval } => {
                sequence.collect_free(out);
                interval.collect_free(out);
            }
            SequenceKind::Named { sequence, .. } => sequence.collect_free(out),
        }
    }

    /// Collect assigned variables into `out`.
    pub fn collect_assigned(&self, out: &mut BTreeMap<String, Decimal>) {
        match self.kind() {
            SequenceKind::Pulses(pulses) => pulses.values().for_each(|p| p.collect_assigned(out)),
            SequenceKind::Append(parts) => parts.iter().for_each(|s| s.collect_assigned(out)),
            SequenceKind::Slice { sequence, interval } => {
                sequence.collect_assigned(out);
                interval.collect_assigned(out);
            }
            SequenceKind::Named { sequence, .. } => sequence.collect_assigned(out),
        }
    }

    /// Collect recorded variable names into `out`.
    pub fn collect_recorded(&self, out: &mut BTreeSet<String>) {
        match self.kind() {
            SequenceKind::Pulses(pulses) => pulses.values().for_each(|p| p.collect_recorded(out)),
            SequenceKind::Append(parts) => parts.iter().for_each(|s| s.collect_recorded(out)),
            SequenceKind::Slice { sequence, .. } | SequenceKind::Named { sequence, .. } => {
                sequence.collect_recorded(out);
            }
        }
    }

    /// Resolve record captures; appended sequences are scanned in playback order.
    pub fn scan_records(&self, acc: Bindings) -> IrResult<Bindings> {
        match self.kind() {
            SequenceKind::Pulses(pulses) => {
                pulses.values().try_fold(acc, |acc, p| p.scan_records(acc))
            }
            SequenceKind::Append(parts) => parts.iter().try_fold(acc, |acc, s| s.scan_records(acc)),
            SequenceKind::Slice { sequence, .. } | SequenceKind::Named { sequence, .. } => {
                sequence.scan_records(acc)
            }
        }
    }

    /// Collect the level couplings used anywhere in the tree.
    pub fn collect_couplings(&self, out: &mut BTreeSet<LevelCoupling>) {
        match self.kind() {
            SequenceKind::Pulses(pulses) => out.extend(pulses.keys().copied()),
            SequenceKind::Append(parts) => parts.iter().for_each(|s| s.collect_couplings(out)),
            SequenceKind::Slice { sequence, .. } | SequenceKind::Named { sequence, .. } => {
                sequence.collect_couplings(out);
            }
        }
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sequence({self})")
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            SequenceKind::Pulses(pulses) => {
                write!(f, "sequence{{")?;
                for (i, (coupling, pulse)) in pulses.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{coupling}: {pulse}")?;
                }
                write!(f, "}}")
            }
            SequenceKind::Append(parts) => {
                write!(f, "append(")?;
                for (i, s) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{s}")?;
                }
                write!(f, ")")
            }
            SequenceKind::Slice { sequence, interval } => write!(f, "{sequence}{interval}"),
            SequenceKind::Named { sequence, name } => write!(f, "{name}: {sequence}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, FieldName};
    use crate::waveform::Waveform;
    use rust_decimal_macros::dec;

    fn rydberg(w: Waveform) -> Sequence {
        Sequence::from_pulse(
            LevelCoupling::GroundRydberg,
            Pulse::from_field(FieldName::RabiAmplitude, Field::uniform(w)),
        )
    }

    #[test]
    fn test_parallel_couplings_take_longest() {
        let mut pulses = BTreeMap::new();
        pulses.insert(
            LevelCoupling::GroundRydberg,
            Pulse::from_field(FieldName::Detuning, Field::uniform(Waveform::constant(0, 1))),
        );
        pulses.insert(
            LevelCoupling::Hyperfine,
            Pulse::from_field(FieldName::Detuning, Field::uniform(Waveform::constant(0, 2))),
        );
        let s = Sequence::new(pulses);
        assert_eq!(s.duration(&Bindings::new()).unwrap(), dec!(2));

        let mut couplings = BTreeSet::new();
        s.collect_couplings(&mut couplings);
        assert_eq!(couplings.len(), 2);
    }

    #[test]
    fn test_record_scan_across_sequences() {
        let first = rydberg(Waveform::linear(0, 7, 1).record("peak"));
        let second = rydberg(Waveform::constant(crate::scalar::Scalar::var("peak"), 1));
        let s = first.append(&second);
        let acc = s.scan_records(Bindings::new()).unwrap();
        assert_eq!(acc.scalar("peak").unwrap(), dec!(7));

        let mut recorded = BTreeSet::new();
        s.collect_recorded(&mut recorded);
        assert!(recorded.contains("peak"));
    }

    #[test]
    fn test_concat_empty_fails() {
        assert_eq!(Sequence::concat(Vec::new()), Err(IrError::EmptyAppend));
    }
}
