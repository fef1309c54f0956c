//! Waveform shape checks.

use tracing::debug;

use rydberg_ir::{AnalogCircuit, FieldName, LevelCoupling};

use super::target_capabilities;
use crate::codegen::series::channel_series;
use crate::error::CompileResult;
use crate::pass::{Pass, PassKind};
use crate::passes::normalize::{ChannelKey, field_drives, normalized_fields, normalized_pulses};
use crate::property::PropertySet;

/// Require the channel shapes the device can play.
///
/// Global detuning and Rabi amplitude must be continuous piecewise-linear
/// waveforms. Rabi phase and local detuning must be piecewise constant.
pub struct ValidateWaveforms;

impl Pass for ValidateWaveforms {
    fn name(&self) -> &'static str {
        "validate_waveforms"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, circuit: &mut AnalogCircuit, properties: &mut PropertySet) -> CompileResult<()> {
        target_capabilities(properties)?;
        let coupling = LevelCoupling::GroundRydberg;
        let Some(pulse) = normalized_pulses(circuit.sequence())?.get(&coupling) else {
            return Ok(());
        };
        let fields = normalized_fields(pulse)?;

        for field in FieldName::ALL {
            for (modulation, waveform) in field_drives(coupling, fields, field)? {
                let key = ChannelKey {
                    coupling,
                    field,
                    modulation: modulation.clone(),
                };
                let series = channel_series(field, modulation, &key.to_string(), waveform)?;
                debug!("{key}: {} breakpoints", series.times.len());
            }
        }
        Ok(())
    }

    fn should_run(&self, _circuit: &AnalogCircuit, properties: &PropertySet) -> bool {
        properties.capabilities.is_some()
    }
}
