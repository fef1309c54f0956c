//! Device capability description.
//!
//! [`Capabilities`] describes the limits of a neutral-atom analog device:
//! how many atoms it can trap, the field of view they must fit in, and the
//! amplitude, slew-rate and timing constraints on each drive channel.
//! Compilers validate programs against these limits and use the listed
//! resolutions when rounding compiled schedules.
//!
//! All quantities are SI: seconds, metres, radians per second.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Hardware capabilities of a neutral-atom analog device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Name of the device.
    pub name: String,
    /// Whether this is an emulator (`true`) or real hardware (`false`).
    pub is_simulator: bool,
    /// Geometry limits for atom placement.
    pub lattice: LatticeLimits,
    /// Limits on the global ground-Rydberg drive.
    pub global: GlobalDriveLimits,
    /// Limits on the local detuning drive. `None` if the device has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalDriveLimits>,
    /// Shot count limits per task.
    pub task: TaskLimits,
}

/// Geometry limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatticeLimits {
    /// Maximum number of sites (filled or vacant).
    pub max_sites: usize,
    /// Maximum number of filled sites.
    pub max_filled_sites: usize,
    /// Width of the field of view.
    pub width: Decimal,
    /// Height of the field of view.
    pub height: Decimal,
    /// Minimum distance between any two sites.
    pub min_radial_spacing: Decimal,
    /// Minimum distance between distinct rows.
    pub min_vertical_spacing: Decimal,
    /// Position grid resolution.
    pub position_resolution: Decimal,
}

/// Limits on the global drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalDriveLimits {
    /// Maximum Rabi frequency amplitude.
    pub rabi_frequency_max: Decimal,
    /// Rabi frequency resolution.
    pub rabi_frequency_resolution: Decimal,
    /// Maximum Rabi frequency slew rate.
    pub rabi_frequency_slew_rate_max: Decimal,
    /// Minimum detuning.
    pub detuning_min: Decimal,
    /// Maximum detuning.
    pub detuning_max: Decimal,
    /// Detuning resolution.
    pub detuning_resolution: Decimal,
    /// Maximum detuning slew rate.
    pub detuning_slew_rate_max: Decimal,
    /// Minimum phase.
    pub phase_min: Decimal,
    /// Maximum phase.
    pub phase_max: Decimal,
    /// Phase resolution.
    pub phase_resolution: Decimal,
    /// Maximum program duration.
    pub time_max: Decimal,
    /// Time grid resolution.
    pub time_resolution: Decimal,
    /// Minimum spacing between two breakpoints.
    pub time_delta_min: Decimal,
}

/// Limits on the local detuning drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDriveLimits {
    /// Minimum local detuning.
    pub detuning_min: Decimal,
    /// Maximum local detuning.
    pub detuning_max: Decimal,
    /// Local detuning resolution.
    pub detuning_resolution: Decimal,
    /// Minimum site coefficient.
    pub site_coefficient_min: Decimal,
    /// Maximum site coefficient.
    pub site_coefficient_max: Decimal,
    /// Maximum number of sites with a nonzero coefficient.
    pub max_nonzero_sites: usize,
}

/// Shot count limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLimits {
    /// Minimum shots per task.
    pub min_shots: u32,
    /// Maximum shots per task.
    pub max_shots: u32,
}

impl Capabilities {
    /// Capabilities of a 256-site Aquila-class device.
    pub fn aquila() -> Self {
        Self {
            name: "aquila".into(),
            is_simulator: false,
            lattice: LatticeLimits {
                max_sites: 256,
                max_filled_sites: 256,
                width: Decimal::new(75, 6),
                height: Decimal::new(76, 6),
                min_radial_spacing: Decimal::new(4, 6),
                min_vertical_spacing: Decimal::new(4, 6),
                position_resolution: Decimal::new(1, 7),
            },
            global: GlobalDriveLimits {
                rabi_frequency_max: Decimal::from(15_800_000),
                rabi_frequency_resolution: Decimal::from(400),
                rabi_frequency_slew_rate_max: Decimal::from(250_000_000_000_000_i64),
                detuning_min: Decimal::from(-125_000_000),
                detuning_max: Decimal::from(125_000_000),
                detuning_resolution: Decimal::new(2, 1),
                detuning_slew_rate_max: Decimal::from(2_500_000_000_000_000_i64),
                phase_min: Decimal::from(-99),
                phase_max: Decimal::from(99),
                phase_resolution: Decimal::new(5, 7),
                time_max: Decimal::new(4, 6),
                time_resolution: Decimal::new(1, 9),
                time_delta_min: Decimal::new(5, 8),
            },
            local: Some(LocalDriveLimits {
                detuning_min: Decimal::ZERO,
                detuning_max: Decimal::from(125_000_000),
                detuning_resolution: Decimal::from(2_000),
                site_coefficient_min: Decimal::ZERO,
                site_coefficient_max: Decimal::ONE,
                max_nonzero_sites: 200,
            }),
            task: TaskLimits {
                min_shots: 1,
                max_shots: 1_000,
            },
        }
    }

    /// Capabilities of an emulator with the given site count.
    ///
    /// Geometry and drive limits match [`Capabilities::aquila`] scaled to
    /// a larger field of view; shot limits are relaxed.
    pub fn simulator(max_sites: usize) -> Self {
        let mut caps = Self::aquila();
        caps.name = "simulator".into();
        caps.is_simulator = true;
        caps.lattice.max_sites = max_sites;
        caps.lattice.max_filled_sites = max_sites;
        caps.lattice.width = Decimal::new(1, 3);
        caps.lattice.height = Decimal::new(1, 3);
        caps.task.max_shots = 100_000;
        caps
    }

    /// Whether the device supports local detuning.
    pub fn has_local_detuning(&self) -> bool {
        self.local.is_some()
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::aquila()
    }
}
