//! The top-level analog program.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rust_decimal::Decimal;

use crate::bindings::Bindings;
use crate::error::IrResult;
use crate::register::Register;
use crate::sequence::Sequence;

/// How far variable binding has progressed on a circuit.
///
/// Binding only moves forward: assignment never removes a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BindingStatus {
    /// No variable has a value yet.
    Symbolic,
    /// Some variables have values, some are still free.
    PartiallyAssigned,
    /// No free variable remains.
    FullyAssigned,
}

/// An immutable program: a register driven by a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnalogCircuit {
    register: Register,
    sequence: Sequence,
}

impl AnalogCircuit {
    /// Create a circuit.
    pub fn new(register: impl Into<Register>, sequence: Sequence) -> Self {
        Self {
            register: register.into(),
            sequence,
        }
    }

    /// The register.
    pub fn register(&self) -> &Register {
        &self.register
    }

    /// The sequence.
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// Replace the sequence, keeping the register.
    pub fn with_sequence(&self, sequence: Sequence) -> Self {
        Self {
            register: self.register.clone(),
            sequence,
        }
    }

    /// Total duration under `bindings`.
    pub fn duration(&self, bindings: &Bindings) -> IrResult<Decimal> {
        self.sequence.duration(bindings)
    }

    /// Assign variables in register and sequence.
    pub fn assign(&self, bindings: &Bindings) -> IrResult<AnalogCircuit> {
        Ok(Self {
            register: self.register.assign(bindings)?,
            sequence: self.sequence.assign(bindings)?,
        })
    }

    /// Names that still need a value.
    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.register.collect_free(&mut out);
        self.sequence.collect_free(&mut out);
        out
    }

    /// Names that already carry a value, with their values.
    pub fn assigned_variables(&self) -> BTreeMap<String, Decimal> {
        let mut out = BTreeMap::new();
        self.sequence.collect_assigned(&mut out);
        out
    }

    /// Names captured by record nodes.
    pub fn recorded_variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.sequence.collect_recorded(&mut out);
        out
    }

    /// Resolve record captures, starting from `acc`.
    pub fn scan_records(&self, acc: Bindings) -> IrResult<Bindings> {
        self.sequence.scan_records(acc)
    }

    /// The current binding status.
    pub fn status(&self) -> BindingStatus {
        if self.free_variables().is_empty() {
            BindingStatus::FullyAssigned
        } else if self.assigned_variables().is_empty() {
            BindingStatus::Symbolic
        } else {
            BindingStatus::PartiallyAssigned
        }
    }
}

impl fmt::Display for AnalogCircuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.register {
            Register::Arrangement(arrangement) => write!(f, "{arrangement} <- {}", self.sequence),
            Register::Parallel(parallel) => write!(
                f,
                "parallel({}, {}) <- {}",
                parallel.arrangement, parallel.cluster_spacing, self.sequence
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, FieldName};
    use crate::pulse::Pulse;
    use crate::register::BravaisLattice;
    use crate::scalar::Scalar;
    use crate::sequence::LevelCoupling;
    use crate::waveform::Waveform;
    use rust_decimal_macros::dec;

    fn circuit() -> AnalogCircuit {
        let detuning = Field::uniform(Waveform::constant(Scalar::var("delta"), Scalar::var("t")));
        let pulse = Pulse::from_field(FieldName::Detuning, detuning);
        AnalogCircuit::new(
            BravaisLattice::chain(2, 5),
            Sequence::from_pulse(LevelCoupling::GroundRydberg, pulse),
        )
    }

    #[test]
    fn test_status_moves_forward() {
        let c = circuit();
        assert_eq!(c.status(), BindingStatus::Symbolic);

        let partial = c.assign(&Bindings::new().with("delta", dec!(1)).unwrap()).unwrap();
        assert_eq!(partial.status(), BindingStatus::PartiallyAssigned);

        let full = partial.assign(&Bindings::new().with("t", dec!(2)).unwrap()).unwrap();
        assert_eq!(full.status(), BindingStatus::FullyAssigned);
        assert_eq!(full.duration(&Bindings::new()).unwrap(), dec!(2));
    }

    #[test]
    fn test_assign_does_not_mutate() {
        let c = circuit();
        let _ = c.assign(&Bindings::new().with("delta", dec!(1)).unwrap()).unwrap();
        assert_eq!(c.free_variables().len(), 2);
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(circuit(), circuit());
    }
}
