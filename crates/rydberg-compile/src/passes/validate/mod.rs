//! Target validation passes.
//!
//! These passes read the device limits from the
//! [`PropertySet`](crate::PropertySet), expressed in program units, and
//! fail on the first violation. None of them changes the circuit. They
//! expect a normalized circuit, except for [`ValidateGeometry`].

pub mod coupling;
pub mod geometry;
pub mod limits;
pub mod modulation;
pub mod waveform;

pub use coupling::ValidateLevelCoupling;
pub use geometry::ValidateGeometry;
pub use limits::ValidateDeviceLimits;
pub use modulation::ValidateSpatialModulation;
pub use waveform::ValidateWaveforms;

use rydberg_hal::Capabilities;

use crate::error::{CompileError, CompileResult};
use crate::property::PropertySet;

fn target_capabilities(properties: &PropertySet) -> CompileResult<&Capabilities> {
    properties
        .capabilities
        .as_ref()
        .ok_or(CompileError::MissingCapabilities)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use rydberg_hal::Capabilities;
    use rydberg_ir::{
        AnalogCircuit, BravaisLattice, Field, FieldName, LevelCoupling, Pulse, Sequence, Waveform,
    };

    use crate::codegen::UnitConversion;
    use crate::pass::Pass;
    use crate::passes::Normalize;
    use crate::property::PropertySet;

    /// Aquila limits in microseconds, micrometres and rad/µs.
    pub(crate) fn aquila() -> Capabilities {
        UnitConversion::si()
            .program_capabilities(&Capabilities::aquila())
            .unwrap()
    }

    /// A one-microsecond ramp on a two-site chain.
    pub(crate) fn ramp_pulse() -> Pulse {
        Pulse::from_field(FieldName::RabiAmplitude, Field::uniform(Waveform::linear(0, 10, 1)))
            .with_field(FieldName::Detuning, Field::uniform(Waveform::constant(0, 1)))
            .unwrap()
    }

    pub(crate) fn circuit(pulse: Pulse) -> AnalogCircuit {
        AnalogCircuit::new(
            BravaisLattice::chain(2, 5),
            Sequence::from_pulse(LevelCoupling::GroundRydberg, pulse),
        )
    }

    /// Normalize `circuit` and attach Aquila limits.
    pub(crate) fn normalized(mut circuit: AnalogCircuit) -> (AnalogCircuit, PropertySet) {
        let mut props = PropertySet::new().with_capabilities(aquila());
        Normalize.run(&mut circuit, &mut props).unwrap();
        (circuit, props)
    }
}
