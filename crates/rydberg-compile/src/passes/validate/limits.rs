//! Device amplitude, slew-rate and timing limits.

use rust_decimal::Decimal;
use tracing::debug;

use rydberg_hal::Capabilities;
use rydberg_ir::{AnalogCircuit, Bindings, FieldName, LevelCoupling, SpatialModulation};

use super::target_capabilities;
use crate::codegen::series::{TimeSeries, channel_series};
use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::passes::normalize::{ChannelKey, field_drives, normalized_fields, normalized_pulses};
use crate::property::PropertySet;

/// Check duration, value ranges, slew rates and breakpoint spacing.
pub struct ValidateDeviceLimits;

/// Limits of one channel.
struct ChannelLimits {
    min: Decimal,
    max: Decimal,
    slew_rate_max: Option<Decimal>,
}

impl ChannelLimits {
    fn for_channel(
        caps: &Capabilities,
        field: FieldName,
        modulation: &SpatialModulation,
        channel: &str,
    ) -> CompileResult<Self> {
        let global = &caps.global;
        Ok(match field {
            FieldName::Detuning if modulation.is_uniform() => ChannelLimits {
                min: global.detuning_min,
                max: global.detuning_max,
                slew_rate_max: Some(global.detuning_slew_rate_max),
            },
            FieldName::Detuning => {
                let local = caps.local.as_ref().ok_or_else(|| {
                    CompileError::UnsupportedSpatialModulation {
                        channel: channel.to_string(),
                        modulation: modulation.to_string(),
                    }
                })?;
                ChannelLimits {
                    min: local.detuning_min,
                    max: local.detuning_max,
                    slew_rate_max: None,
                }
            }
            FieldName::RabiAmplitude => ChannelLimits {
                min: Decimal::ZERO,
                max: global.rabi_frequency_max,
                slew_rate_max: Some(global.rabi_frequency_slew_rate_max),
            },
            FieldName::RabiPhase => ChannelLimits {
                min: global.phase_min,
                max: global.phase_max,
                slew_rate_max: None,
            },
        })
    }

    fn check(&self, channel: &str, series: &TimeSeries, time_delta_min: Decimal) -> CompileResult<()> {
        if let Some(value) = series.values.iter().find(|v| **v < self.min || **v > self.max) {
            return Err(CompileError::ValueOutOfRange {
                channel: channel.to_string(),
                value: *value,
                min: self.min,
                max: self.max,
            });
        }

        if let Some(limit) = self.slew_rate_max {
            if let Some(slope) = series.max_slope().filter(|s| *s > limit) {
                return Err(CompileError::ValueOutOfRange {
                    channel: format!("{channel} slew rate"),
                    value: slope,
                    min: -limit,
                    max: limit,
                });
            }
        }

        let gap = series.times.windows(2).map(|t| t[1] - t[0]).find(|gap| *gap < time_delta_min);
        if let Some(gap) = gap {
            return Err(CompileError::TimeStepTooShort {
                channel: channel.to_string(),
                gap,
                min: time_delta_min,
            });
        }
        Ok(())
    }
}

impl Pass for ValidateDeviceLimits {
    fn name(&self) -> &'static str {
        "validate_device_limits"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, circuit: &mut AnalogCircuit, properties: &mut PropertySet) -> CompileResult<()> {
        let caps = target_capabilities(properties)?;
        let duration = match properties.duration {
            Some(duration) => duration,
            None => circuit.duration(&Bindings::new())?,
        };
        if duration > caps.global.time_max {
            return Err(CompileError::DurationTooLong {
                duration,
                max: caps.global.time_max,
            });
        }

        let coupling = LevelCoupling::GroundRydberg;
        let Some(pulse) = normalized_pulses(circuit.sequence())?.get(&coupling) else {
            return Ok(());
        };
        let fields = normalized_fields(pulse)?;

        for field in FieldName::ALL {
            for (modulation, waveform) in field_drives(coupling, fields, field)? {
                let channel = ChannelKey {
                    coupling,
                    field,
                    modulation: modulation.clone(),
                }
                .to_string();
                let series = channel_series(field, modulation, &channel, waveform)?;
                ChannelLimits::for_channel(caps, field, modulation, &channel)?.check(
                    &channel,
                    &series,
                    caps.global.time_delta_min,
                )?;
            }
        }

        debug!("program of duration {duration} within device limits");
        Ok(())
    }

    fn should_run(&self, _circuit: &AnalogCircuit, properties: &PropertySet) -> bool {
        properties.capabilities.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::validate::fixtures::{circuit, normalized, ramp_pulse};
    use rust_decimal_macros::dec;
    use rydberg_ir::{Field, Pulse, Waveform};

    fn run(pulse: Pulse) -> CompileResult<()> {
        let (mut c, mut props) = normalized(circuit(pulse));
        ValidateDeviceLimits.run(&mut c, &mut props)
    }

    #[test]
    fn test_ramp_within_limits() {
        run(ramp_pulse()).unwrap();
    }

    #[test]
    fn test_duration_too_long() {
        let pulse = Pulse::from_field(FieldName::Detuning, Field::uniform(Waveform::constant(0, 5)));
        let err = run(pulse).unwrap_err();
        assert!(matches!(
            err,
            CompileError::DurationTooLong { duration, max } if duration == dec!(5) && max == dec!(4)
        ));
    }

    #[test]
    fn test_amplitude_above_maximum() {
        let amplitude = Waveform::linear(0, 20, 1).append(&Waveform::linear(20, 0, 1));
        let pulse = Pulse::from_field(FieldName::RabiAmplitude, Field::uniform(amplitude));
        let err = run(pulse).unwrap_err();
        match err {
            CompileError::ValueOutOfRange { value, max, .. } => {
                assert_eq!(value, dec!(20));
                assert_eq!(max, dec!(15.8));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_slew_rate_exceeded() {
        let amplitude = Waveform::linear(0, 10, dec!(0.01));
        let pulse = Pulse::from_field(FieldName::RabiAmplitude, Field::uniform(amplitude));
        let err = run(pulse).unwrap_err();
        assert!(matches!(
            err,
            CompileError::ValueOutOfRange { ref channel, .. } if channel.ends_with("slew rate")
        ));
    }

    #[test]
    fn test_breakpoints_too_close() {
        let detuning = Waveform::linear(0, dec!(0.1), dec!(0.01))
            .append(&Waveform::linear(dec!(0.1), 0, dec!(0.99)));
        let pulse = Pulse::from_field(FieldName::Detuning, Field::uniform(detuning));
        let err = run(pulse).unwrap_err();
        match err {
            CompileError::TimeStepTooShort { gap, min, .. } => {
                assert_eq!(gap, dec!(0.01));
                assert_eq!(min, dec!(0.05));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_local_detuning_rejected() {
        let field = Field::uniform(Waveform::constant(0, 1)).with_drive(
            SpatialModulation::scaled_locations([(0, 1)]),
            Waveform::constant(-1, 1),
        );
        let err = run(ramp_pulse().with_field(FieldName::Detuning, field).unwrap()).unwrap_err();
        assert!(matches!(err, CompileError::ValueOutOfRange { value, .. } if value == dec!(-1)));
    }
}
