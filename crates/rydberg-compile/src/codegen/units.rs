//! Unit conversion between program units and device units.
//!
//! Programs are written in microseconds, micrometres and rad/µs. Devices
//! describe their limits, and expect tasks, in SI units. Conversion is a
//! pure scaling applied once, at the end of code generation; validation
//! runs in program units against limits converted the other way.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rydberg_hal::{Capabilities, GlobalDriveLimits, LatticeLimits, LocalDriveLimits};
use rydberg_ir::IrError;

use crate::error::{CompileError, CompileResult};

/// Factors from program units to device units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitConversion {
    /// Device time units per program time unit.
    pub time: Decimal,
    /// Device energy (angular frequency) units per program energy unit.
    pub energy: Decimal,
    /// Device length units per program length unit.
    pub length: Decimal,
}

impl UnitConversion {
    /// µs → s, rad/µs → rad/s, µm → m.
    pub fn si() -> Self {
        Self {
            time: Decimal::new(1, 6),
            energy: Decimal::from(1_000_000),
            length: Decimal::new(1, 6),
        }
    }

    /// No conversion.
    pub fn identity() -> Self {
        Self {
            time: Decimal::ONE,
            energy: Decimal::ONE,
            length: Decimal::ONE,
        }
    }

    /// Convert a program time.
    pub fn time(&self, value: Decimal) -> CompileResult<Decimal> {
        scale(value, self.time)
    }

    /// Convert a program energy.
    pub fn energy(&self, value: Decimal) -> CompileResult<Decimal> {
        scale(value, self.energy)
    }

    /// Convert a program length.
    pub fn length(&self, value: Decimal) -> CompileResult<Decimal> {
        scale(value, self.length)
    }

    /// Express device limits (device units) in program units.
    pub fn program_capabilities(&self, caps: &Capabilities) -> CompileResult<Capabilities> {
        for (name, factor) in [("time", self.time), ("energy", self.energy), ("length", self.length)] {
            if factor <= Decimal::ZERO {
                return Err(CompileError::InvalidConfiguration(format!(
                    "{name} conversion factor must be positive, got {factor}"
                )));
            }
        }
        let length = |v| unscale(v, self.length);
        let energy = |v| unscale(v, self.energy);
        let time = |v| unscale(v, self.time);
        // energy per time
        let slew = |v: Decimal| unscale(scale(v, self.time)?, self.energy);

        let lattice = &caps.lattice;
        let global = &caps.global;
        Ok(Capabilities {
            name: caps.name.clone(),
            is_simulator: caps.is_simulator,
            lattice: LatticeLimits {
                max_sites: lattice.max_sites,
                max_filled_sites: lattice.max_filled_sites,
                width: length(lattice.width)?,
                height: length(lattice.height)?,
                min_radial_spacing: length(lattice.min_radial_spacing)?,
                min_vertical_spacing: length(lattice.min_vertical_spacing)?,
                position_resolution: length(lattice.position_resolution)?,
            },
            global: GlobalDriveLimits {
                rabi_frequency_max: energy(global.rabi_frequency_max)?,
                rabi_frequency_resolution: energy(global.rabi_frequency_resolution)?,
                rabi_frequency_slew_rate_max: slew(global.rabi_frequency_slew_rate_max)?,
                detuning_min: energy(global.detuning_min)?,
                detuning_max: energy(global.detuning_max)?,
                detuning_resolution: energy(global.detuning_resolution)?,
                detuning_slew_rate_max: slew(global.detuning_slew_rate_max)?,
                phase_min: global.phase_min,
                phase_max: global.phase_max,
                phase_resolution: global.phase_resolution,
                time_max: time(global.time_max)?,
                time_resolution: time(global.time_resolution)?,
                time_delta_min: time(global.time_delta_min)?,
            },
            local: caps
                .local
                .as_ref()
                .map(|local| {
                    Ok::<_, CompileError>(LocalDriveLimits {
                        detuning_min: energy(local.detuning_min)?,
                        detuning_max: energy(local.detuning_max)?,
                        detuning_resolution: energy(local.detuning_resolution)?,
                        ..local.clone()
                    })
                })
                .transpose()?,
            task: caps.task.clone(),
        })
    }
}

impl Default for UnitConversion {
    fn default() -> Self {
        Self::si()
    }
}

fn scale(value: Decimal, factor: Decimal) -> CompileResult<Decimal> {
    value
        .checked_mul(factor)
        .map(|v| v.normalize())
        .ok_or_else(|| IrError::ArithmeticOverflow(format!("{value} * {factor}")).into())
}

fn unscale(value: Decimal, factor: Decimal) -> CompileResult<Decimal> {
    if factor.is_zero() {
        return Err(IrError::DivisionByZero(format!("{value} / {factor}")).into());
    }
    value
        .checked_div(factor)
        .map(|v| v.normalize())
        .ok_or_else(|| IrError::ArithmeticOverflow(format!("{value} / {factor}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_si_conversion() {
        let units = UnitConversion::si();
        assert_eq!(units.time(dec!(4)).unwrap(), dec!(0.000004));
        assert_eq!(units.energy(dec!(15.8)).unwrap(), dec!(15800000));
        assert_eq!(units.length(dec!(6.1)).unwrap(), dec!(0.0000061));
    }

    #[test]
    fn test_aquila_in_program_units() {
        let caps = UnitConversion::si()
            .program_capabilities(&Capabilities::aquila())
            .unwrap();
        assert_eq!(caps.lattice.width, dec!(75));
        assert_eq!(caps.lattice.min_radial_spacing, dec!(4));
        assert_eq!(caps.global.rabi_frequency_max, dec!(15.8));
        assert_eq!(caps.global.rabi_frequency_slew_rate_max, dec!(250));
        assert_eq!(caps.global.detuning_slew_rate_max, dec!(2500));
        assert_eq!(caps.global.time_max, dec!(4));
        assert_eq!(caps.global.time_resolution, dec!(0.001));
        assert_eq!(caps.local.unwrap().detuning_max, dec!(125));
    }

    #[test]
    fn test_identity_leaves_limits() {
        let aquila = Capabilities::aquila();
        let caps = UnitConversion::identity().program_capabilities(&aquila).unwrap();
        assert_eq!(caps, aquila);
    }

    #[test]
    fn test_nonpositive_factor_rejected() {
        let units = UnitConversion {
            time: Decimal::ZERO,
            ..UnitConversion::si()
        };
        assert!(matches!(
            units.program_capabilities(&Capabilities::aquila()),
            Err(CompileError::InvalidConfiguration(_))
        ));
    }
}
