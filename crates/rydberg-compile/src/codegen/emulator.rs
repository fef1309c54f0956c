//! Code generation for the numeric emulator.
//!
//! The emulator receives the logical register (one cluster for parallel
//! registers) and per-coupling drive terms with compiled waveforms, all in
//! program units. Only filled sites are simulated, so site indices of
//! spatial modulations are remapped onto the compacted site list.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use rydberg_ir::{AnalogCircuit, Bindings, Field, FieldName, LevelCoupling, SpatialModulation};

use super::cache::{CompiledWaveform, WaveformCache};
use super::series::is_zero;
use crate::error::CompileResult;
use crate::passes::normalize::{normalized_fields, normalized_pulses};
use crate::passes::validate::modulation::check_sites;

/// Input of the numeric emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorProgram {
    /// Positions of the filled sites.
    pub sites: Vec<(Decimal, Decimal)>,
    /// Blockade radius for truncating the Hilbert space, if any.
    pub blockade_radius: Option<Decimal>,
    /// Program duration.
    pub duration: Decimal,
    /// Drive terms per level coupling.
    pub drives: BTreeMap<LevelCoupling, LevelDrive>,
}

/// Drive terms of one level coupling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelDrive {
    pub detuning: Vec<DetuningTerm>,
    pub rabi: Vec<RabiTerm>,
}

/// `Σ_i c_i · Δ(t) · n_i`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetuningTerm {
    /// Compacted site index → coefficient; zero coefficients are omitted.
    pub coefficients: BTreeMap<usize, Decimal>,
    pub waveform: CompiledWaveform,
}

/// `Σ_i c_i · Ω(t) · e^{iφ(t)} · σ_i`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RabiTerm {
    /// Compacted site index → coefficient; zero coefficients are omitted.
    pub coefficients: BTreeMap<usize, Decimal>,
    pub amplitude: CompiledWaveform,
    /// Phase with the same modulation, `None` when it is zero.
    pub phase: Option<CompiledWaveform>,
}

impl EmulatorProgram {
    /// Number of simulated sites.
    pub fn n_sites(&self) -> usize {
        self.sites.len()
    }
}

/// Emits an [`EmulatorProgram`] from a normalized circuit.
#[derive(Debug, Clone, Default)]
pub struct EmulatorCodegen {
    blockade_radius: Option<Decimal>,
}

impl EmulatorCodegen {
    pub fn new(blockade_radius: Option<Decimal>) -> Self {
        Self { blockade_radius }
    }

    /// Generate the program, interning waveforms through `cache`.
    pub fn generate(
        &self,
        circuit: &AnalogCircuit,
        cache: &mut WaveformCache,
    ) -> CompileResult<EmulatorProgram> {
        let bindings = Bindings::new();
        let resolved = circuit.register().arrangement().resolve(&bindings)?;
        let mut compact = Vec::with_capacity(resolved.len());
        let mut sites = Vec::new();
        for site in &resolved {
            if site.filled {
                compact.push(Some(sites.len()));
                sites.push((site.x, site.y));
            } else {
                compact.push(None);
            }
        }

        let mut drives = BTreeMap::new();
        for (coupling, pulse) in normalized_pulses(circuit.sequence())? {
            let fields = normalized_fields(pulse)?;
            let drive = LevelDrive {
                detuning: self.detuning_terms(fields, &compact, cache)?,
                rabi: self.rabi_terms(fields, &compact, cache)?,
            };
            drives.insert(*coupling, drive);
        }

        let program = EmulatorProgram {
            sites,
            blockade_radius: self.blockade_radius,
            duration: circuit.duration(&bindings)?,
            drives,
        };
        debug!(
            "emulator program: {} sites, {} distinct waveforms",
            program.n_sites(),
            cache.len()
        );
        Ok(program)
    }

    fn detuning_terms(
        &self,
        fields: &BTreeMap<FieldName, Field>,
        compact: &[Option<usize>],
        cache: &mut WaveformCache,
    ) -> CompileResult<Vec<DetuningTerm>> {
        let Some(field) = fields.get(&FieldName::Detuning) else {
            return Ok(Vec::new());
        };
        let mut terms = Vec::new();
        for (modulation, waveform) in field.drives() {
            if is_zero(waveform) {
                continue;
            }
            let coefficients = site_coefficients(modulation, compact)?;
            if !coefficients.is_empty() {
                terms.push(DetuningTerm {
                    coefficients,
                    waveform: cache.intern(waveform)?,
                });
            }
        }
        Ok(terms)
    }

    fn rabi_terms(
        &self,
        fields: &BTreeMap<FieldName, Field>,
        compact: &[Option<usize>],
        cache: &mut WaveformCache,
    ) -> CompileResult<Vec<RabiTerm>> {
        let Some(amplitude) = fields.get(&FieldName::RabiAmplitude) else {
            return Ok(Vec::new());
        };
        let phases = fields.get(&FieldName::RabiPhase).map(Field::drives);

        let mut terms = Vec::new();
        for (modulation, waveform) in amplitude.drives() {
            if is_zero(waveform) {
                continue;
            }
            let coefficients = site_coefficients(modulation, compact)?;
            if coefficients.is_empty() {
                continue;
            }
            let phase = phases
                .and_then(|drives| drives.get(modulation))
                .filter(|w| !is_zero(w))
                .map(|w| cache.intern(w))
                .transpose()?;
            terms.push(RabiTerm {
                coefficients,
                amplitude: cache.intern(waveform)?,
                phase,
            });
        }
        Ok(terms)
    }
}

/// Nonzero coefficients of `modulation` on the filled sites.
fn site_coefficients(
    modulation: &SpatialModulation,
    compact: &[Option<usize>],
) -> CompileResult<BTreeMap<usize, Decimal>> {
    check_sites(modulation, compact.len())?;
    let values = modulation.coefficients(compact.len(), &Bindings::new())?;
    Ok(compact
        .iter()
        .zip(values)
        .filter_map(|(index, value)| match index {
            Some(index) if !value.is_zero() => Some((*index, value)),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::Pass;
    use crate::passes::Normalize;
    use crate::property::PropertySet;
    use rust_decimal_macros::dec;
    use rydberg_ir::{ListOfLocations, Pulse, Sequence, Waveform};

    fn emulate(pulse: Pulse) -> (EmulatorProgram, WaveformCache) {
        let register = ListOfLocations::new()
            .add_position(0, 0, true)
            .add_position(5, 0, false)
            .add_position(10, 0, true);
        let mut circuit = AnalogCircuit::new(
            register,
            Sequence::from_pulse(LevelCoupling::GroundRydberg, pulse),
        );
        Normalize.run(&mut circuit, &mut PropertySet::new()).unwrap();
        let mut cache = WaveformCache::new();
        let program = EmulatorCodegen::new(Some(dec!(8)))
            .generate(&circuit, &mut cache)
            .unwrap();
        (program, cache)
    }

    #[test]
    fn test_only_filled_sites_emitted() {
        let pulse = Pulse::from_field(
            FieldName::RabiAmplitude,
            Field::uniform(Waveform::linear(0, 10, 1)),
        );
        let (program, _) = emulate(pulse);
        assert_eq!(program.sites, vec![(dec!(0), dec!(0)), (dec!(10), dec!(0))]);
        assert_eq!(program.blockade_radius, Some(dec!(8)));
        assert_eq!(program.duration, dec!(1));

        let drive = &program.drives[&LevelCoupling::GroundRydberg];
        assert!(drive.detuning.is_empty());
        assert_eq!(drive.rabi.len(), 1);
        assert_eq!(drive.rabi[0].coefficients.len(), 2);
        assert!(drive.rabi[0].phase.is_none());
    }

    #[test]
    fn test_local_indices_remapped() {
        let detuning = Field::new().with_drive(
            SpatialModulation::scaled_locations([(1, dec!(0.3)), (2, dec!(0.7))]),
            Waveform::constant(1, 1),
        );
        let (program, _) = emulate(Pulse::from_field(FieldName::Detuning, detuning));
        let term = &program.drives[&LevelCoupling::GroundRydberg].detuning[0];
        let expected: BTreeMap<usize, Decimal> = [(1, dec!(0.7))].into_iter().collect();
        assert_eq!(term.coefficients, expected);
    }

    #[test]
    fn test_identical_waveforms_shared() {
        let w = Waveform::linear(0, 4, 1);
        let pulse = Pulse::from_field(FieldName::RabiAmplitude, Field::uniform(w.clone()))
            .with_field(FieldName::Detuning, Field::uniform(w))
            .unwrap();
        let (program, cache) = emulate(pulse);
        let drive = &program.drives[&LevelCoupling::GroundRydberg];
        assert!(drive.detuning[0].waveform.ptr_eq(&drive.rabi[0].amplitude));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);
    }
}
