//! Spatial modulation legality.

use rydberg_ir::{AnalogCircuit, Bindings, SpatialModulation};

use super::target_capabilities;
use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::passes::normalize::{normalized_fields, normalized_pulses};
use crate::property::PropertySet;

/// Check every non-uniform drive against the register and the device.
///
/// Scaled locations must address existing sites and run-time vectors must
/// carry one coefficient per site. The Rabi fields accept only uniform
/// drives; detuning accepts at most one local drive, and only on devices
/// with local detuning. Local coefficients must lie in the device range.
pub struct ValidateSpatialModulation;

impl Pass for ValidateSpatialModulation {
    fn name(&self) -> &'static str {
        "validate_spatial_modulation"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, circuit: &mut AnalogCircuit, properties: &mut PropertySet) -> CompileResult<()> {
        let caps = target_capabilities(properties)?;
        let n_sites = circuit.register().n_sites();

        for (coupling, pulse) in normalized_pulses(circuit.sequence())? {
            for (name, field) in normalized_fields(pulse)? {
                let local: Vec<&SpatialModulation> =
                    field.drives().keys().filter(|m| !m.is_uniform()).collect();
                for modulation in &local {
                    check_sites(modulation, n_sites)?;
                }
                let Some(first) = local.first() else {
                    continue;
                };

                let channel = format!("{coupling}.{name}");
                let limits = match caps.local.as_ref() {
                    Some(limits) if !name.is_rabi() => limits,
                    _ => {
                        return Err(CompileError::UnsupportedSpatialModulation {
                            channel,
                            modulation: first.to_string(),
                        });
                    }
                };
                if local.len() > 1 {
                    return Err(CompileError::MultipleLocalModulations {
                        channel,
                        count: local.len(),
                    });
                }

                for value in first.coefficients(n_sites, &Bindings::new())? {
                    if value < limits.site_coefficient_min || value > limits.site_coefficient_max {
                        return Err(CompileError::ValueOutOfRange {
                            channel: format!("{channel} coefficient"),
                            value,
                            min: limits.site_coefficient_min,
                            max: limits.site_coefficient_max,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn should_run(&self, _circuit: &AnalogCircuit, properties: &PropertySet) -> bool {
        properties.capabilities.is_some()
    }
}

/// Check that `modulation` fits a register of `n_sites` sites.
pub(crate) fn check_sites(modulation: &SpatialModulation, n_sites: usize) -> CompileResult<()> {
    match modulation {
        SpatialModulation::ScaledLocations(locations) => {
            match locations.keys().find(|index| **index >= n_sites) {
                Some(index) => Err(CompileError::LocationOutOfRange {
                    index: *index,
                    n_sites,
                }),
                None => Ok(()),
            }
        }
        SpatialModulation::AssignedRunTimeVector { name, values } if values.len() != n_sites => {
            Err(CompileError::VectorLengthMismatch {
                name: name.clone(),
                expected: n_sites,
                found: values.len(),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::validate::fixtures::{circuit, normalized, ramp_pulse};
    use rust_decimal_macros::dec;
    use rydberg_ir::{Field, FieldName, Pulse, Waveform};

    fn with_detuning(field: Field) -> AnalogCircuit {
        let pulse = Pulse::from_field(FieldName::Detuning, field)
            .with_field(
                FieldName::RabiAmplitude,
                Field::uniform(Waveform::linear(0, 10, 1)),
            )
            .unwrap();
        circuit(pulse)
    }

    fn run(c: AnalogCircuit) -> CompileResult<()> {
        let (mut c, mut props) = normalized(c);
        ValidateSpatialModulation.run(&mut c, &mut props)
    }

    #[test]
    fn test_single_local_detuning_accepted() {
        let field = Field::uniform(Waveform::constant(0, 1)).with_drive(
            SpatialModulation::scaled_locations([(1, dec!(0.5))]),
            Waveform::constant(2, 1),
        );
        run(with_detuning(field)).unwrap();
    }

    #[test]
    fn test_multiple_local_modulations() {
        let field = Field::uniform(Waveform::constant(0, 1))
            .with_drive(
                SpatialModulation::scaled_locations([(0, 1)]),
                Waveform::constant(1, 1),
            )
            .with_drive(
                SpatialModulation::scaled_locations([(1, 1)]),
                Waveform::constant(1, 1),
            );
        let err = run(with_detuning(field)).unwrap_err();
        assert!(matches!(
            err,
            CompileError::MultipleLocalModulations { count: 2, .. }
        ));
    }

    #[test]
    fn test_location_out_of_range() {
        let field = Field::uniform(Waveform::constant(0, 1)).with_drive(
            SpatialModulation::scaled_locations([(5, 1)]),
            Waveform::constant(1, 1),
        );
        let err = run(with_detuning(field)).unwrap_err();
        assert!(matches!(
            err,
            CompileError::LocationOutOfRange { index: 5, n_sites: 2 }
        ));
    }

    #[test]
    fn test_vector_length_mismatch() {
        let modulation = SpatialModulation::AssignedRunTimeVector {
            name: "mask".into(),
            values: vec![dec!(1), dec!(0), dec!(1)],
        };
        let field =
            Field::uniform(Waveform::constant(0, 1)).with_drive(modulation, Waveform::constant(1, 1));
        let err = run(with_detuning(field)).unwrap_err();
        assert!(matches!(
            err,
            CompileError::VectorLengthMismatch { expected: 2, found: 3, .. }
        ));
    }

    #[test]
    fn test_local_rabi_rejected() {
        let pulse = ramp_pulse()
            .with_field(
                FieldName::RabiAmplitude,
                Field::new().with_drive(
                    SpatialModulation::scaled_locations([(0, 1)]),
                    Waveform::linear(0, 1, 1),
                ),
            )
            .unwrap();
        let err = run(circuit(pulse)).unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnsupportedSpatialModulation { .. }
        ));
    }

    #[test]
    fn test_coefficient_out_of_range() {
        let field = Field::uniform(Waveform::constant(0, 1)).with_drive(
            SpatialModulation::scaled_locations([(0, 2)]),
            Waveform::constant(1, 1),
        );
        let err = run(with_detuning(field)).unwrap_err();
        assert!(matches!(err, CompileError::ValueOutOfRange { value, .. } if value == dec!(2)));
    }
}
