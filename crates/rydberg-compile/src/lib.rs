//! Rydberg Compilation Framework
//!
//! This crate turns symbolic analog programs from [`rydberg_ir`] into
//! executable programs: hardware task specifications for
//! [`rydberg_hal`] devices, or drive terms for a numeric emulator. It uses
//! the same pass-based architecture as a gate-level transpiler, over an
//! analog circuit instead of a DAG.
//!
//! # Overview
//!
//! Every task goes through the same stages:
//! 1. **Binding**: static values, positional arguments and one batch entry
//!    are substituted; record nodes capture values in playback order
//! 2. **Normalization**: appends and slices are pushed down to the
//!    waveforms so each channel is one flat waveform of the full duration
//! 3. **Validation**: for hardware targets, the program is checked against
//!    the device limits
//! 4. **Code generation**: breakpoint series, site coefficients and the
//!    lattice are emitted, converted to device units and rounded
//!
//! # Architecture
//!
//! ```text
//! AnalogCircuit (symbolic) + Params
//!       │
//!       ▼
//! ┌─────────────┐
//! │ PassManager │ ◄── PropertySet (bindings, capabilities, duration)
//! └─────────────┘
//!       │
//!       ├── AssignVariables / RecordScan
//!       ├── Normalize
//!       └── ValidateGeometry / ValidateLevelCoupling / ValidateSpatialModulation
//!           ValidateWaveforms / ValidateDeviceLimits
//!       │
//!       ▼
//! HardwareCodegen ──► HardwareTask      EmulatorCodegen ──► EmulatorProgram
//! ```
//!
//! # Example: Batch Compilation
//!
//! ```rust
//! use rydberg_compile::{Compiler, Params};
//! use rydberg_hal::Capabilities;
//! use rydberg_ir::{
//!     AnalogCircuit, BravaisLattice, Field, FieldName, LevelCoupling, Pulse, Scalar, Sequence,
//!     Waveform,
//! };
//! use rust_decimal::Decimal;
//!
//! let detuning = Waveform::constant(Scalar::var("delta"), 1);
//! let amplitude = Waveform::linear(0, 10, 1);
//! let pulse = Pulse::from_field(FieldName::Detuning, Field::uniform(detuning))
//!     .with_field(FieldName::RabiAmplitude, Field::uniform(amplitude))
//!     .unwrap();
//! let circuit = AnalogCircuit::new(
//!     BravaisLattice::square(2, 6),
//!     Sequence::from_pulse(LevelCoupling::GroundRydberg, pulse),
//! );
//!
//! let params = Params::new()
//!     .batch_assign([("delta", vec![Decimal::from(-5), Decimal::from(5)])])
//!     .unwrap();
//!
//! let programs = Compiler::emulator().compile_batch(&circuit, &params, &[]).unwrap();
//! assert_eq!(programs.len(), 2);
//! ```
//!
//! # Built-in Passes
//!
//! - [`passes::AssignVariables`]: substitute the task bindings
//! - [`passes::RecordScan`]: capture recorded values, report missing names
//! - [`passes::Normalize`]: one flat waveform per channel
//! - [`passes::ValidateGeometry`]: site counts, extent and spacing
//! - [`passes::ValidateLevelCoupling`]: ground-Rydberg only
//! - [`passes::ValidateSpatialModulation`]: local drive legality
//! - [`passes::ValidateWaveforms`]: piecewise-linear and piecewise-constant shapes
//! - [`passes::ValidateDeviceLimits`]: duration, value ranges and slew rates
//!
//! # Units
//!
//! Programs are written in µs, µm and rad/µs. Validation runs against the
//! device limits converted to these units; code generation converts to
//! device units once, at the end. See [`UnitConversion`].

pub mod codegen;
pub mod compiler;
pub mod error;
pub mod manager;
pub mod params;
pub mod pass;
pub mod passes;
pub mod property;

pub use codegen::{
    CompiledWaveform, EmulatorProgram, HardwareCodegen, RoundingPolicy, UnitConversion,
    WaveformCache,
};
pub use compiler::{CompileOptions, CompiledProgram, Compiler};
pub use error::{CompileError, CompileResult};
pub use manager::{PassManager, PassManagerBuilder};
pub use params::Params;
pub use pass::{Pass, PassKind};
pub use property::{PropertySet, RecordedValues};
