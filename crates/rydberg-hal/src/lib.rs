//! Rydberg Hardware Abstraction Layer
//!
//! This crate describes neutral-atom analog devices and the documents
//! exchanged with them. It carries no networking; submission clients sit
//! outside this workspace.
//!
//! # Overview
//!
//! - [`Capabilities`] lists device limits in SI units
//! - [`DeviceConfig`] loads capabilities and compile defaults from YAML or
//!   JSON with environment overrides
//! - [`TaskSpecification`] and [`HardwareTask`] are the wire-format task
//!   documents, with a [`ParallelDecoder`] for tiled registers
//! - [`BraketProgram`] is the Braket AHS form of a task
//!
//! # Example: Loading a Device
//!
//! ```rust
//! use rydberg_hal::{DeviceConfig, RoundingMode};
//!
//! let yaml = "compile:\n  nshots: 250\n";
//! let config: DeviceConfig = serde_yaml_ng::from_str(yaml).unwrap();
//! config.validate().unwrap();
//!
//! assert_eq!(config.compile.nshots, 250);
//! assert_eq!(config.compile.rounding, RoundingMode::NearestEven);
//! assert_eq!(config.device.lattice.max_sites, 256);
//! ```

pub mod braket;
pub mod capability;
pub mod config;
pub mod error;
pub mod task;

pub use braket::{BraketProgram, Pattern, PhysicalField};
pub use capability::{
    Capabilities, GlobalDriveLimits, LatticeLimits, LocalDriveLimits, TaskLimits,
};
pub use config::{CompileDefaults, DeviceConfig, RoundingMode};
pub use error::{HalError, HalResult};
pub use task::{
    BatchTasks, ClusterLocation, Detuning, EffectiveHamiltonian, GlobalField, HardwareTask,
    Lattice, LocalField, ParallelDecoder, RabiFrequencyAmplitude, RabiFrequencyPhase,
    RydbergHamiltonian, TaskSpecification,
};
