//! Structural normalization.
//!
//! Rewrites the sequence of a fully assigned circuit into a single
//! `Pulses` node whose pulses are `Fields` nodes whose drives are flat
//! waveforms: one waveform per channel, covering the whole program.
//! Appends and slices at the sequence and pulse layers are pushed down to
//! the waveforms and flattened away.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rust_decimal::Decimal;
use tracing::debug;

use rydberg_ir::{
    AnalogCircuit, Bindings, Field, FieldName, Interval, LevelCoupling, Pulse, PulseKind, Scalar,
    Sequence, SequenceKind, SpatialModulation, Waveform, WaveformKind,
};

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;

/// Address of one drive channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey {
    /// Level coupling of the pulse.
    pub coupling: LevelCoupling,
    /// Field within the pulse.
    pub field: FieldName,
    /// Spatial modulation within the field.
    pub modulation: SpatialModulation,
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}[{}]", self.coupling, self.field, self.modulation)
    }
}

/// Normalize the sequence and record the program duration.
///
/// Channels absent from part of the program are padded with zero
/// constants. Channels that are present side by side must last exactly
/// as long as each other, otherwise [`CompileError::ChannelDurationMismatch`].
/// Every coupling that appears gets all three uniform fields.
pub struct Normalize;

impl Pass for Normalize {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, circuit: &mut AnalogCircuit, properties: &mut PropertySet) -> CompileResult<()> {
        let free = circuit.free_variables();
        if !free.is_empty() {
            return Err(CompileError::NotFullyAssigned(free.into_iter().collect()));
        }

        let (sequence, duration) = normalize_sequence(circuit.sequence())?;
        debug!("normalized sequence, duration {duration}");
        *circuit = circuit.with_sequence(sequence);
        properties.duration = Some(duration);
        Ok(())
    }
}

/// Normalize a fully assigned sequence, returning it with its duration.
pub fn normalize_sequence(sequence: &Sequence) -> CompileResult<(Sequence, Decimal)> {
    let bindings = Bindings::new();
    let duration = sequence.duration(&bindings)?;

    let mut keys = BTreeSet::new();
    collect_channels(sequence, &mut keys);
    let couplings: BTreeSet<LevelCoupling> = keys.iter().map(|k| k.coupling).collect();
    for coupling in couplings {
        for field in FieldName::ALL {
            keys.insert(ChannelKey {
                coupling,
                field,
                modulation: SpatialModulation::Uniform,
            });
        }
    }

    let mut tree: BTreeMap<LevelCoupling, BTreeMap<FieldName, BTreeMap<SpatialModulation, Waveform>>> =
        BTreeMap::new();
    for key in keys {
        let waveform = sequence_channel(sequence, &key, &bindings)?.flatten(&bindings)?;
        let channel_duration = waveform.duration(&bindings)?;
        if channel_duration != duration {
            return Err(CompileError::ChannelDurationMismatch {
                channel: key.to_string(),
                duration: channel_duration,
                expected: duration,
            });
        }
        tree.entry(key.coupling)
            .or_default()
            .entry(key.field)
            .or_default()
            .insert(key.modulation, waveform);
    }

    let pulses = tree
        .into_iter()
        .map(|(coupling, fields)| {
            let fields = fields
                .into_iter()
                .map(|(name, drives)| (name, Field::from_drives(drives)))
                .collect();
            (coupling, Pulse::new(fields))
        })
        .collect();
    Ok((Sequence::new(pulses), duration))
}

/// Whether `sequence` has the shape produced by [`normalize_sequence`].
pub fn is_normalized(sequence: &Sequence) -> bool {
    let SequenceKind::Pulses(pulses) = sequence.kind() else {
        return false;
    };
    pulses.values().all(|pulse| match pulse.kind() {
        PulseKind::Fields(fields) => fields
            .values()
            .flat_map(|field| field.drives().values())
            .all(|w| w.leaf_segments().iter().all(is_flat_segment)),
        _ => false,
    })
}

/// Whether a segment of a flattened waveform needs no further rewriting.
pub(crate) fn is_flat_segment(segment: &Waveform) -> bool {
    !matches!(
        segment.kind(),
        WaveformKind::Append(_)
            | WaveformKind::Record { .. }
            | WaveformKind::Sample { .. }
            | WaveformKind::Aligned { .. }
    )
}

/// The pulses of a normalized sequence, by coupling.
pub(crate) fn normalized_pulses(sequence: &Sequence) -> CompileResult<&BTreeMap<LevelCoupling, Pulse>> {
    match sequence.kind() {
        SequenceKind::Pulses(pulses) if is_normalized(sequence) => Ok(pulses),
        _ => Err(CompileError::NotNormalized("expected a single pulses block".into())),
    }
}

/// The fields of a normalized pulse.
pub(crate) fn normalized_fields(pulse: &Pulse) -> CompileResult<&BTreeMap<FieldName, Field>> {
    match pulse.kind() {
        PulseKind::Fields(fields) => Ok(fields),
        _ => Err(CompileError::NotNormalized("expected a fields pulse".into())),
    }
}

/// The drives of one field of a normalized pulse, uniform drive included.
pub(crate) fn field_drives(
    coupling: LevelCoupling,
    fields: &BTreeMap<FieldName, Field>,
    name: FieldName,
) -> CompileResult<&BTreeMap<SpatialModulation, Waveform>> {
    let drives = fields
        .get(&name)
        .map(Field::drives)
        .ok_or_else(|| CompileError::NotNormalized(format!("{coupling}.{name} is missing")))?;
    if !drives.contains_key(&SpatialModulation::Uniform) {
        return Err(CompileError::NotNormalized(format!(
            "{coupling}.{name} has no uniform drive"
        )));
    }
    Ok(drives)
}

fn collect_channels(sequence: &Sequence, out: &mut BTreeSet<ChannelKey>) {
    match sequence.kind() {
        SequenceKind::Pulses(pulses) => {
            for (coupling, pulse) in pulses {
                collect_pulse_channels(*coupling, pulse, out);
            }
        }
        SequenceKind::Append(parts) => parts.iter().for_each(|s| collect_channels(s, out)),
        SequenceKind::Slice { sequence, .. } | SequenceKind::Named { sequence, .. } => {
            collect_channels(sequence, out);
        }
    }
}

fn collect_pulse_channels(coupling: LevelCoupling, pulse: &Pulse, out: &mut BTreeSet<ChannelKey>) {
    match pulse.kind() {
        PulseKind::Fields(fields) => {
            for (field, drives) in fields {
                for modulation in drives.drives().keys() {
                    out.insert(ChannelKey {
                        coupling,
                        field: *field,
                        modulation: modulation.clone(),
                    });
                }
            }
        }
        PulseKind::Append(parts) => parts
            .iter()
            .for_each(|p| collect_pulse_channels(coupling, p, out)),
        PulseKind::Slice { pulse, .. } | PulseKind::Named { pulse, .. } => {
            collect_pulse_channels(coupling, pulse, out);
        }
    }
}

/// Common duration of side-by-side channels.
fn common_duration<I>(entries: I) -> CompileResult<Decimal>
where
    I: IntoIterator<Item = (String, CompileResult<Decimal>)>,
{
    let mut expected: Option<Decimal> = None;
    for (channel, duration) in entries {
        let duration = duration?;
        match expected {
            None => expected = Some(duration),
            Some(expected) if expected != duration => {
                return Err(CompileError::ChannelDurationMismatch {
                    channel,
                    duration,
                    expected,
                });
            }
            Some(_) => {}
        }
    }
    Ok(expected.unwrap_or(Decimal::ZERO))
}

fn zero(duration: Decimal) -> Waveform {
    Waveform::constant(Scalar::zero(), duration)
}

fn sliced(waveform: Waveform, duration: Decimal, interval: &Interval, bindings: &Bindings) -> CompileResult<Waveform> {
    let (start, stop) = interval.resolve(duration, bindings)?;
    Ok(waveform.slice(Interval::between(start, stop)))
}

fn sequence_channel(sequence: &Sequence, key: &ChannelKey, bindings: &Bindings) -> CompileResult<Waveform> {
    match sequence.kind() {
        SequenceKind::Pulses(pulses) => {
            let duration = common_duration(
                pulses
                    .iter()
                    .map(|(c, p)| (c.to_string(), p.duration(bindings).map_err(Into::into))),
            )?;
            match pulses.get(&key.coupling) {
                Some(pulse) => pulse_channel(pulse, key, bindings),
                None => Ok(zero(duration)),
            }
        }
        SequenceKind::Append(parts) => Ok(Waveform::concat(
            parts
                .iter()
                .map(|s| sequence_channel(s, key, bindings))
                .collect::<CompileResult<Vec<_>>>()?,
        )?),
        SequenceKind::Slice { sequence, interval } => sliced(
            sequence_channel(sequence, key, bindings)?,
            sequence.duration(bindings)?,
            interval,
            bindings,
        ),
        SequenceKind::Named { sequence, .. } => sequence_channel(sequence, key, bindings),
    }
}

fn pulse_channel(pulse: &Pulse, key: &ChannelKey, bindings: &Bindings) -> CompileResult<Waveform> {
    match pulse.kind() {
        PulseKind::Fields(fields) => {
            let duration = common_duration(fields.iter().flat_map(|(name, field)| {
                field.drives().iter().map(move |(modulation, w)| {
                    (
                        format!("{}.{name}[{modulation}]", key.coupling),
                        w.duration(bindings).map_err(Into::into),
                    )
                })
            }))?;
            Ok(fields
                .get(&key.field)
                .and_then(|field| field.drives().get(&key.modulation))
                .cloned()
                .unwrap_or_else(|| zero(duration)))
        }
        PulseKind::Append(parts) => Ok(Waveform::concat(
            parts
                .iter()
                .map(|p| pulse_channel(p, key, bindings))
                .collect::<CompileResult<Vec<_>>>()?,
        )?),
        PulseKind::Slice { pulse, interval } => sliced(
            pulse_channel(pulse, key, bindings)?,
            pulse.duration(bindings)?,
            interval,
            bindings,
        ),
        PulseKind::Named { pulse, .. } => pulse_channel(pulse, key, bindings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use rydberg_ir::BravaisLattice;

    fn rydberg(pulse: Pulse) -> Sequence {
        Sequence::from_pulse(LevelCoupling::GroundRydberg, pulse)
    }

    #[test]
    fn test_pads_missing_fields() {
        let pulse = Pulse::from_field(FieldName::Detuning, Field::uniform(Waveform::constant(3, 2)));
        let (seq, duration) = normalize_sequence(&rydberg(pulse)).unwrap();
        assert_eq!(duration, dec!(2));
        assert!(is_normalized(&seq));

        let pulse = seq.pulse(LevelCoupling::GroundRydberg).unwrap();
        let phase = &pulse.field(FieldName::RabiPhase).unwrap().drives()[&SpatialModulation::Uniform];
        assert_eq!(phase.constant_value(), Some(Decimal::ZERO));
        assert_eq!(phase.duration(&Bindings::new()).unwrap(), dec!(2));
    }

    #[test]
    fn test_pads_channel_absent_from_one_segment() {
        let first = Pulse::from_field(FieldName::Detuning, Field::uniform(Waveform::constant(1, 1)));
        let second = Pulse::from_field(
            FieldName::RabiAmplitude,
            Field::uniform(Waveform::linear(0, 4, 2)),
        );
        let (seq, _) = normalize_sequence(&rydberg(first).append(&rydberg(second))).unwrap();
        let pulse = seq.pulse(LevelCoupling::GroundRydberg).unwrap();
        let amplitude = &pulse.field(FieldName::RabiAmplitude).unwrap().drives()[&SpatialModulation::Uniform];

        let segments = amplitude.leaf_segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].constant_value(), Some(Decimal::ZERO));
        assert_eq!(segments[1].linear_endpoints(), Some((dec!(0), dec!(4))));
    }

    #[test]
    fn test_duration_mismatch() {
        let pulse = Pulse::from_field(FieldName::Detuning, Field::uniform(Waveform::constant(1, 1)))
            .with_field(
                FieldName::RabiAmplitude,
                Field::uniform(Waveform::constant(1, 2)),
            )
            .unwrap();
        let err = normalize_sequence(&rydberg(pulse)).unwrap_err();
        assert!(matches!(err, CompileError::ChannelDurationMismatch { .. }));
    }

    #[test]
    fn test_slice_pushed_into_linear_segment() {
        let pulse = Pulse::from_field(
            FieldName::RabiAmplitude,
            Field::uniform(Waveform::linear(0, 10, 4)),
        );
        let seq = rydberg(pulse).slice(Interval::between(1, 3));
        let (seq, duration) = normalize_sequence(&seq).unwrap();
        assert_eq!(duration, dec!(2));

        let pulse = seq.pulse(LevelCoupling::GroundRydberg).unwrap();
        let amplitude = &pulse.field(FieldName::RabiAmplitude).unwrap().drives()[&SpatialModulation::Uniform];
        assert!(matches!(amplitude.kind(), WaveformKind::Linear { .. }));
        assert_eq!(amplitude.linear_endpoints(), Some((dec!(2.5), dec!(7.5))));
    }

    #[test]
    fn test_normalize_pass_requires_assignment() {
        let pulse = Pulse::from_field(
            FieldName::Detuning,
            Field::uniform(Waveform::constant(Scalar::var("d"), 1)),
        );
        let mut circuit = AnalogCircuit::new(BravaisLattice::chain(1, 5), rydberg(pulse));
        let err = Normalize.run(&mut circuit, &mut PropertySet::new()).unwrap_err();
        assert!(matches!(err, CompileError::NotFullyAssigned(names) if names == vec!["d"]));
    }
}
