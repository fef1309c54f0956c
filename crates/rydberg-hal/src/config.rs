//! Device configuration loading.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML, or JSON for `.json` paths)
//! 2. Environment variables (with `RYDBERG_` prefix)
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use std::fmt;
use std::path::Path;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::Capabilities;
use crate::error::{HalError, HalResult};

/// Complete device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device limits.
    #[serde(default)]
    pub device: Capabilities,

    /// Defaults applied when compiling tasks for this device.
    #[serde(default)]
    pub compile: CompileDefaults,
}

/// Task compilation defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileDefaults {
    /// Shots per task
    #[serde(default = "default_nshots")]
    pub nshots: u32,

    /// Rounding applied to times, values and positions
    #[serde(default)]
    pub rounding: RoundingMode,
}

/// How compiled quantities are snapped to the device resolution grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Round half to even.
    #[default]
    NearestEven,
    /// Round half away from zero.
    NearestAwayFromZero,
    /// Truncate.
    TowardZero,
    /// Round up in magnitude.
    AwayFromZero,
}

impl RoundingMode {
    /// Round `value` to the nearest multiple of `resolution`.
    ///
    /// A non-positive resolution leaves the value unchanged.
    pub fn round_to(self, value: Decimal, resolution: Decimal) -> Decimal {
        if resolution <= Decimal::ZERO {
            return value;
        }
        let steps = (value / resolution).round_dp_with_strategy(0, self.strategy());
        (steps * resolution).normalize()
    }

    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::NearestEven => RoundingStrategy::MidpointNearestEven,
            RoundingMode::NearestAwayFromZero => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::TowardZero => RoundingStrategy::ToZero,
            RoundingMode::AwayFromZero => RoundingStrategy::AwayFromZero,
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundingMode::NearestEven => "nearest_even",
            RoundingMode::NearestAwayFromZero => "nearest_away_from_zero",
            RoundingMode::TowardZero => "toward_zero",
            RoundingMode::AwayFromZero => "away_from_zero",
        };
        f.write_str(name)
    }
}

fn default_nshots() -> u32 {
    100
}

impl Default for CompileDefaults {
    fn default() -> Self {
        CompileDefaults {
            nshots: default_nshots(),
            rounding: RoundingMode::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            device: Capabilities::default(),
            compile: CompileDefaults::default(),
        }
    }
}

impl DeviceConfig {
    /// Load configuration from a file.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> HalResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let config: DeviceConfig = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml_ng::from_str(&contents)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with the following precedence:
    /// 1. Load from file if provided
    /// 2. Apply environment variable overrides
    pub fn load(config_file: Option<&Path>) -> HalResult<Self> {
        let config = if let Some(path) = config_file {
            debug!(path = %path.display(), "loading device configuration");
            Self::from_file(path)?
        } else {
            DeviceConfig::default()
        };

        let config = config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Merge environment variables into this configuration.
    ///
    /// Only variables that are explicitly set override the file-loaded (or
    /// default) values.
    pub fn merge_env(self) -> Self {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    fn merge_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("RYDBERG_DEVICE_NAME") {
            self.device.name = v;
        }
        if let Some(v) = lookup("RYDBERG_NSHOTS") {
            if let Ok(val) = v.parse() {
                self.compile.nshots = val;
            }
        }
        if let Some(v) = lookup("RYDBERG_MAX_SITES") {
            if let Ok(val) = v.parse() {
                self.device.lattice.max_sites = val;
            }
        }
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> HalResult<()> {
        let lattice = &self.device.lattice;
        if lattice.max_sites == 0 {
            return Err(HalError::Configuration(
                "max_sites must be greater than 0".into(),
            ));
        }
        for (name, value) in [
            ("width", lattice.width),
            ("height", lattice.height),
            ("time_max", self.device.global.time_max),
            ("time_resolution", self.device.global.time_resolution),
            ("rabi_frequency_max", self.device.global.rabi_frequency_max),
        ] {
            if value <= Decimal::ZERO {
                return Err(HalError::Configuration(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.device.global.detuning_min > self.device.global.detuning_max {
            return Err(HalError::Configuration(format!(
                "detuning_min {} exceeds detuning_max {}",
                self.device.global.detuning_min, self.device.global.detuning_max
            )));
        }

        let task = &self.device.task;
        if task.min_shots > task.max_shots {
            return Err(HalError::Configuration(format!(
                "min_shots {} exceeds max_shots {}",
                task.min_shots, task.max_shots
            )));
        }
        if !(task.min_shots..=task.max_shots).contains(&self.compile.nshots) {
            return Err(HalError::Configuration(format!(
                "nshots {} outside device range [{}, {}]",
                self.compile.nshots, task.min_shots, task.max_shots
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = DeviceConfig::default();
        assert_eq!(config.device.name, "aquila");
        assert_eq!(config.compile.nshots, 100);
        assert_eq!(config.compile.rounding, RoundingMode::NearestEven);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_sites() {
        let mut config = DeviceConfig::default();
        config.device.lattice.max_sites = 0;
        assert!(matches!(config.validate(), Err(HalError::Configuration(_))));
    }

    #[test]
    fn test_validate_negative_width() {
        let mut config = DeviceConfig::default();
        config.device.lattice.width = dec!(-1);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("width"));
    }

    #[test]
    fn test_validate_nshots_range() {
        let mut config = DeviceConfig::default();
        config.compile.nshots = 5_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_vars_overrides_only_set_values() {
        let vars: HashMap<&str, &str> = [("RYDBERG_NSHOTS", "250"), ("RYDBERG_MAX_SITES", "oops")]
            .into_iter()
            .collect();
        let config = DeviceConfig::default()
            .merge_vars(|key| vars.get(key).map(|v| (*v).to_string()));
        assert_eq!(config.compile.nshots, 250);
        assert_eq!(config.device.lattice.max_sites, 256);
        assert_eq!(config.device.name, "aquila");
    }

    #[test]
    fn test_yaml_partial_config_uses_defaults() {
        let yaml = "compile:\n  nshots: 50\n  rounding: toward_zero\n";
        let config: DeviceConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.compile.nshots, 50);
        assert_eq!(config.compile.rounding, RoundingMode::TowardZero);
        assert_eq!(config.device, Capabilities::aquila());
    }

    #[test]
    fn test_rounding_modes() {
        let res = dec!(0.1);
        assert_eq!(RoundingMode::NearestEven.round_to(dec!(0.25), res), dec!(0.2));
        assert_eq!(RoundingMode::NearestAwayFromZero.round_to(dec!(0.25), res), dec!(0.3));
        assert_eq!(RoundingMode::TowardZero.round_to(dec!(-0.29), res), dec!(-0.2));
        assert_eq!(RoundingMode::AwayFromZero.round_to(dec!(0.21), res), dec!(0.3));
        assert_eq!(RoundingMode::NearestEven.round_to(dec!(0.123), Decimal::ZERO), dec!(0.123));
    }
}
