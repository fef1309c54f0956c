//! Snapping device-unit values to the device resolution grid.

use rust_decimal::Decimal;

use rydberg_hal::{Capabilities, RoundingMode};

/// Per-quantity resolutions and the rounding mode applied to them.
///
/// Resolutions are in device units. A zero resolution leaves values exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundingPolicy {
    /// How ties and remainders are resolved.
    pub mode: RoundingMode,
    /// Breakpoint time grid.
    pub time_resolution: Decimal,
    /// Site coordinate grid.
    pub position_resolution: Decimal,
    /// Global detuning grid.
    pub detuning_resolution: Decimal,
    /// Rabi amplitude grid.
    pub rabi_resolution: Decimal,
    /// Rabi phase grid.
    pub phase_resolution: Decimal,
    /// Local detuning grid.
    pub local_detuning_resolution: Decimal,
}

impl RoundingPolicy {
    /// Resolutions of `caps` with the given mode.
    pub fn from_capabilities(caps: &Capabilities, mode: RoundingMode) -> Self {
        Self {
            mode,
            time_resolution: caps.global.time_resolution,
            position_resolution: caps.lattice.position_resolution,
            detuning_resolution: caps.global.detuning_resolution,
            rabi_resolution: caps.global.rabi_frequency_resolution,
            phase_resolution: caps.global.phase_resolution,
            local_detuning_resolution: caps
                .local
                .as_ref()
                .map_or(Decimal::ZERO, |local| local.detuning_resolution),
        }
    }

    /// No rounding at all.
    pub fn exact() -> Self {
        Self {
            mode: RoundingMode::default(),
            time_resolution: Decimal::ZERO,
            position_resolution: Decimal::ZERO,
            detuning_resolution: Decimal::ZERO,
            rabi_resolution: Decimal::ZERO,
            phase_resolution: Decimal::ZERO,
            local_detuning_resolution: Decimal::ZERO,
        }
    }

    /// Round `value` to `resolution` with this policy's mode.
    pub fn round(&self, value: Decimal, resolution: Decimal) -> Decimal {
        self.mode.round_to(value, resolution)
    }

    pub fn time(&self, value: Decimal) -> Decimal {
        self.round(value, self.time_resolution)
    }

    pub fn position(&self, value: Decimal) -> Decimal {
        self.round(value, self.position_resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_aquila_time_grid() {
        let policy = RoundingPolicy::from_capabilities(&Capabilities::aquila(), RoundingMode::NearestEven);
        assert_eq!(policy.time(dec!(0.0000012345)), dec!(0.000001234));
        assert_eq!(policy.position(dec!(0.00000612)), dec!(0.0000061));
    }

    #[test]
    fn test_exact_policy_keeps_values() {
        let policy = RoundingPolicy::exact();
        assert_eq!(policy.time(dec!(1.23456789)), dec!(1.23456789));
        assert_eq!(policy.round(dec!(0.5), policy.rabi_resolution), dec!(0.5));
    }

    #[test]
    fn test_mode_applies() {
        let mut policy = RoundingPolicy::exact();
        policy.mode = RoundingMode::AwayFromZero;
        policy.time_resolution = dec!(0.1);
        assert_eq!(policy.time(dec!(0.11)), dec!(0.2));
    }
}
