//! Code generation for hardware tasks.

use std::collections::BTreeMap;

use tracing::debug;

use rydberg_hal::{
    Capabilities, Detuning, EffectiveHamiltonian, GlobalField, HardwareTask, Lattice, LocalField,
    ParallelDecoder, RabiFrequencyAmplitude, RabiFrequencyPhase, RydbergHamiltonian,
    TaskSpecification,
};
use rydberg_ir::{
    AnalogCircuit, Bindings, Field, FieldName, LevelCoupling, Register, ResolvedSite,
    SpatialModulation,
};

use super::parallel::tile;
use super::rounding::RoundingPolicy;
use super::series::{TimeSeries, channel_series};
use super::units::UnitConversion;
use crate::compiler::CompileOptions;
use crate::error::{CompileError, CompileResult};
use crate::passes::normalize::{ChannelKey, field_drives, normalized_fields, normalized_pulses};
use crate::passes::validate::modulation::check_sites;

/// Physical quantity carried by a channel.
#[derive(Debug, Clone, Copy)]
enum Quantity {
    Detuning,
    Rabi,
    Phase,
    LocalDetuning,
}

/// Sites of the task and how they map back to the logical register.
struct Layout {
    sites: Vec<ResolvedSite>,
    decoder: Option<ParallelDecoder>,
    copies: usize,
    cluster_sites: usize,
}

/// Emits a [`HardwareTask`] from a normalized, validated circuit.
///
/// Breakpoints are computed in program units, then converted to device
/// units and rounded to the device resolution, in that order and once.
pub struct HardwareCodegen<'a> {
    program_capabilities: &'a Capabilities,
    units: UnitConversion,
    rounding: RoundingPolicy,
    nshots: u32,
}

impl<'a> HardwareCodegen<'a> {
    /// `capabilities` are in device units, `program_capabilities` the same
    /// limits in program units.
    pub fn new(
        capabilities: &Capabilities,
        program_capabilities: &'a Capabilities,
        options: &CompileOptions,
    ) -> Self {
        let rounding = options
            .rounding
            .map_or_else(RoundingPolicy::exact, |mode| {
                RoundingPolicy::from_capabilities(capabilities, mode)
            });
        Self {
            program_capabilities,
            units: options.units,
            rounding,
            nshots: options.nshots,
        }
    }

    pub fn generate(&self, circuit: &AnalogCircuit) -> CompileResult<HardwareTask> {
        let pulses = normalized_pulses(circuit.sequence())?;
        if let Some(coupling) = pulses.keys().find(|c| **c != LevelCoupling::GroundRydberg) {
            return Err(CompileError::UnsupportedLevelCoupling(*coupling));
        }
        let coupling = LevelCoupling::GroundRydberg;
        let pulse = pulses
            .get(&coupling)
            .ok_or_else(|| CompileError::NotNormalized("no ground-Rydberg pulse".into()))?;
        let fields = normalized_fields(pulse)?;

        let layout = self.layout(circuit.register())?;
        let amplitude = self.global(coupling, fields, FieldName::RabiAmplitude)?;
        let phase = self.global(coupling, fields, FieldName::RabiPhase)?;
        let detuning = self.global(coupling, fields, FieldName::Detuning)?;
        let local = self.local_detuning(coupling, fields, &layout)?;

        let lattice = Lattice {
            sites: layout
                .sites
                .iter()
                .map(|site| {
                    Ok((
                        self.rounding.position(self.units.length(site.x)?),
                        self.rounding.position(self.units.length(site.y)?),
                    ))
                })
                .collect::<CompileResult<_>>()?,
            filling: layout.sites.iter().map(|site| u8::from(site.filled)).collect(),
        };

        let task_specification = TaskSpecification {
            nshots: self.nshots,
            lattice,
            effective_hamiltonian: EffectiveHamiltonian {
                rydberg: RydbergHamiltonian {
                    rabi_frequency_amplitude: RabiFrequencyAmplitude {
                        global: self.field(&amplitude, Quantity::Rabi)?,
                    },
                    rabi_frequency_phase: RabiFrequencyPhase {
                        global: self.field(&phase, Quantity::Phase)?,
                    },
                    detuning: Detuning {
                        global: self.field(&detuning, Quantity::Detuning)?,
                        local,
                    },
                },
            },
        };
        task_specification.check()?;

        debug!(
            "generated task: {} sites, {} amplitude breakpoints",
            task_specification.lattice.sites.len(),
            amplitude.times.len()
        );
        Ok(HardwareTask {
            task_specification,
            parallel_decoder: layout.decoder,
        })
    }

    fn layout(&self, register: &Register) -> CompileResult<Layout> {
        match register {
            Register::Arrangement(arrangement) => {
                let sites = arrangement.resolve(&Bindings::new())?;
                if sites.is_empty() {
                    return Err(CompileError::EmptyRegister);
                }
                Ok(Layout {
                    cluster_sites: sites.len(),
                    sites,
                    decoder: None,
                    copies: 1,
                })
            }
            Register::Parallel(parallel) => {
                let tiling = tile(parallel, &self.program_capabilities.lattice)?;
                Ok(Layout {
                    sites: tiling.sites,
                    decoder: Some(tiling.decoder),
                    copies: tiling.copies,
                    cluster_sites: parallel.arrangement.n_sites(),
                })
            }
        }
    }

    /// Breakpoints of the uniform drive of a global channel.
    fn global(
        &self,
        coupling: LevelCoupling,
        fields: &BTreeMap<FieldName, Field>,
        field: FieldName,
    ) -> CompileResult<TimeSeries> {
        let drives = field_drives(coupling, fields, field)?;
        let uniform = SpatialModulation::Uniform;
        if field.is_rabi() {
            if let Some(modulation) = drives.keys().find(|m| !m.is_uniform()) {
                return Err(CompileError::UnsupportedSpatialModulation {
                    channel: format!("{coupling}.{field}"),
                    modulation: modulation.to_string(),
                });
            }
        }
        let waveform = drives.get(&uniform).ok_or_else(|| {
            CompileError::NotNormalized(format!("{coupling}.{field} has no uniform drive"))
        })?;
        let key = ChannelKey {
            coupling,
            field,
            modulation: uniform.clone(),
        };
        channel_series(field, &uniform, &key.to_string(), waveform)
    }

    fn local_detuning(
        &self,
        coupling: LevelCoupling,
        fields: &BTreeMap<FieldName, Field>,
        layout: &Layout,
    ) -> CompileResult<Option<LocalField>> {
        let field = FieldName::Detuning;
        let local: Vec<_> = field_drives(coupling, fields, field)?
            .iter()
            .filter(|(m, _)| !m.is_uniform())
            .collect();
        let (modulation, waveform) = match local.as_slice() {
            [] => return Ok(None),
            [single] => *single,
            _ => {
                return Err(CompileError::MultipleLocalModulations {
                    channel: format!("{coupling}.{field}"),
                    count: local.len(),
                });
            }
        };

        check_sites(modulation, layout.cluster_sites)?;
        let key = ChannelKey {
            coupling,
            field,
            modulation: modulation.clone(),
        };
        let series = channel_series(field, modulation, &key.to_string(), waveform)?;
        let cluster = modulation.coefficients(layout.cluster_sites, &Bindings::new())?;
        let GlobalField { times, values } = self.field(&series, Quantity::LocalDetuning)?;

        Ok(Some(LocalField {
            times,
            values,
            lattice_site_coefficients: (0..layout.copies)
                .flat_map(|_| cluster.iter().copied())
                .collect(),
        }))
    }

    /// Convert and round one channel.
    fn field(&self, series: &TimeSeries, quantity: Quantity) -> CompileResult<GlobalField> {
        let rounding = &self.rounding;
        let (resolution, scaled) = match quantity {
            Quantity::Detuning => (rounding.detuning_resolution, true),
            Quantity::Rabi => (rounding.rabi_resolution, true),
            Quantity::Phase => (rounding.phase_resolution, false),
            Quantity::LocalDetuning => (rounding.local_detuning_resolution, true),
        };
        let device = series.map(
            |t| Ok(rounding.time(self.units.time(t)?)),
            |v| {
                let v = if scaled { self.units.energy(v)? } else { v };
                Ok(rounding.round(v, resolution))
            },
        )?;
        Ok(GlobalField::new(device.times, device.values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::Pass;
    use crate::passes::Normalize;
    use crate::property::PropertySet;
    use rust_decimal_macros::dec;
    use rydberg_ir::{BravaisLattice, Pulse, Sequence, Waveform};

    fn normalized(register: impl Into<Register>, pulse: Pulse) -> AnalogCircuit {
        let mut circuit = AnalogCircuit::new(
            register,
            Sequence::from_pulse(LevelCoupling::GroundRydberg, pulse),
        );
        Normalize.run(&mut circuit, &mut PropertySet::new()).unwrap();
        circuit
    }

    fn ramp() -> Pulse {
        Pulse::from_field(
            FieldName::RabiAmplitude,
            Field::uniform(Waveform::linear(0, 10, 1)),
        )
    }

    fn options() -> CompileOptions {
        CompileOptions {
            units: UnitConversion::identity(),
            rounding: None,
            ..CompileOptions::default()
        }
    }

    #[test]
    fn test_identity_units_two_site_chain() {
        let caps = Capabilities::aquila();
        let circuit = normalized(BravaisLattice::chain(2, 5), ramp());
        let task = HardwareCodegen::new(&caps, &caps, &options())
            .generate(&circuit)
            .unwrap();

        let spec = &task.task_specification;
        let rydberg = &spec.effective_hamiltonian.rydberg;
        assert_eq!(rydberg.rabi_frequency_amplitude.global.times, vec![dec!(0), dec!(1)]);
        assert_eq!(rydberg.rabi_frequency_amplitude.global.values, vec![dec!(0), dec!(10)]);
        assert_eq!(rydberg.detuning.global.values, vec![dec!(0), dec!(0)]);
        assert_eq!(spec.lattice.sites, vec![(dec!(0), dec!(0)), (dec!(5), dec!(0))]);
        assert_eq!(spec.lattice.filling, vec![1, 1]);
        assert!(rydberg.detuning.local.is_none());
        assert!(task.parallel_decoder.is_none());
    }

    #[test]
    fn test_si_units_and_rounding() {
        let caps = Capabilities::aquila();
        let program = UnitConversion::si().program_capabilities(&caps).unwrap();
        let circuit = normalized(BravaisLattice::chain(2, dec!(6.12)), ramp());
        let task = HardwareCodegen::new(&caps, &program, &CompileOptions::default())
            .generate(&circuit)
            .unwrap();

        let spec = &task.task_specification;
        let amplitude = &spec.effective_hamiltonian.rydberg.rabi_frequency_amplitude.global;
        assert_eq!(amplitude.times, vec![dec!(0), dec!(0.000001)]);
        assert_eq!(amplitude.values, vec![dec!(0), dec!(10000000)]);
        assert_eq!(spec.lattice.sites[1], (dec!(0.0000061), dec!(0)));
    }

    #[test]
    fn test_local_detuning_coefficients() {
        let detuning = Field::uniform(Waveform::constant(0, 1)).with_drive(
            SpatialModulation::scaled_locations([(1, dec!(0.5))]),
            Waveform::constant(2, 1),
        );
        let pulse = ramp().with_field(FieldName::Detuning, detuning).unwrap();
        let caps = Capabilities::aquila();
        let circuit = normalized(BravaisLattice::chain(2, 5), pulse);
        let task = HardwareCodegen::new(&caps, &caps, &options())
            .generate(&circuit)
            .unwrap();

        let local = task
            .task_specification
            .effective_hamiltonian
            .rydberg
            .detuning
            .local
            .unwrap();
        assert_eq!(local.times, vec![dec!(0), dec!(1)]);
        assert_eq!(local.values, vec![dec!(2), dec!(2)]);
        assert_eq!(local.lattice_site_coefficients, vec![dec!(0), dec!(0.5)]);
    }

    #[test]
    fn test_unnormalized_sequence_rejected() {
        let caps = Capabilities::aquila();
        let circuit = AnalogCircuit::new(
            BravaisLattice::chain(2, 5),
            Sequence::from_pulse(LevelCoupling::GroundRydberg, ramp()).append(
                &Sequence::from_pulse(LevelCoupling::GroundRydberg, ramp()),
            ),
        );
        let err = HardwareCodegen::new(&caps, &caps, &options())
            .generate(&circuit)
            .unwrap_err();
        assert!(matches!(err, CompileError::NotNormalized(_)));
    }
}
