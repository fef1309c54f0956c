//! Discretization and code generation.
//!
//! Walks a normalized, validated circuit and emits target programs:
//! - [`HardwareCodegen`]: breakpoint series per channel, site coefficient
//!   vectors and lattice coordinates, converted to device units and rounded
//!   to the device resolution, with parallel tiling
//! - [`EmulatorCodegen`]: drive terms with compiled waveforms in program
//!   units

pub mod cache;
pub mod emulator;
pub mod hardware;
pub mod parallel;
pub mod rounding;
pub mod series;
pub mod units;

pub use cache::{CompiledWaveform, WaveformCache};
pub use emulator::{DetuningTerm, EmulatorCodegen, EmulatorProgram, LevelDrive, RabiTerm};
pub use hardware::HardwareCodegen;
pub use parallel::{Tiling, tile};
pub use rounding::RoundingPolicy;
pub use series::{TimeSeries, channel_series, piecewise_constant, piecewise_linear};
pub use units::UnitConversion;
