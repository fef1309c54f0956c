//! Level coupling support.

use rydberg_ir::{AnalogCircuit, LevelCoupling};

use super::target_capabilities;
use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::passes::normalize::normalized_pulses;
use crate::property::PropertySet;

/// Reject pulses on couplings the device cannot drive.
///
/// Hardware targets drive only the ground-Rydberg transition.
pub struct ValidateLevelCoupling;

impl Pass for ValidateLevelCoupling {
    fn name(&self) -> &'static str {
        "validate_level_coupling"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, circuit: &mut AnalogCircuit, properties: &mut PropertySet) -> CompileResult<()> {
        target_capabilities(properties)?;
        let pulses = normalized_pulses(circuit.sequence())?;
        match pulses.keys().find(|c| **c != LevelCoupling::GroundRydberg) {
            Some(coupling) => Err(CompileError::UnsupportedLevelCoupling(*coupling)),
            None => Ok(()),
        }
    }

    fn should_run(&self, _circuit: &AnalogCircuit, properties: &PropertySet) -> bool {
        properties.capabilities.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::validate::fixtures::{circuit, normalized, ramp_pulse};
    use rydberg_ir::Sequence;

    #[test]
    fn test_ground_rydberg_accepted() {
        let (mut c, mut props) = normalized(circuit(ramp_pulse()));
        ValidateLevelCoupling.run(&mut c, &mut props).unwrap();
    }

    #[test]
    fn test_hyperfine_rejected() {
        let c = circuit(ramp_pulse());
        let seq = Sequence::from_pulse(LevelCoupling::Hyperfine, ramp_pulse());
        let (mut c, mut props) = normalized(c.with_sequence(seq));
        let err = ValidateLevelCoupling.run(&mut c, &mut props).unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnsupportedLevelCoupling(LevelCoupling::Hyperfine)
        ));
    }

    #[test]
    fn test_skipped_without_capabilities() {
        let c = circuit(ramp_pulse());
        assert!(!ValidateLevelCoupling.should_run(&c, &PropertySet::new()));
    }
}
