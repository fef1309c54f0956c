//! Rydberg Analog Program Intermediate Representation
//!
//! This crate provides the immutable expression trees that describe an
//! analog program for a neutral-atom device: time-dependent waveforms
//! driving detuning and Rabi fields over a spatial arrangement of atoms.
//! It forms the foundation of the compilation stack in `rydberg-compile`.
//!
//! # Overview
//!
//! Every node is a cheap-to-clone handle over shared, reference-counted
//! data. Deriving a node (appending, slicing, assigning) never mutates its
//! operands; it allocates a new node that shares them. All node types
//! implement structural `Eq` and `Hash`.
//!
//! Times, values and coordinates are exact decimals ([`rust_decimal::Decimal`]).
//!
//! # Core Components
//!
//! - **Scalars**: [`Scalar`] symbolic arithmetic with [`Interval`] slicing
//! - **Waveforms**: [`Waveform`] segments and combinators, flattening to leaf segments
//! - **Fields**: [`SpatialModulation`] x [`Waveform`] drives summed into a [`Field`]
//! - **Pulses and sequences**: [`Pulse`] keyed by [`FieldName`], [`Sequence`] keyed by [`LevelCoupling`]
//! - **Registers**: [`AtomArrangement`] lattices and lists, [`ParallelRegister`] tiling
//! - **Circuit**: [`AnalogCircuit`] bundling register and sequence
//! - **Bindings**: [`Bindings`] from variable name to [`ParamValue`]
//!
//! # Example: Evaluating a Ramp
//!
//! ```rust
//! use rydberg_ir::{Bindings, Scalar, Waveform};
//! use rust_decimal::Decimal;
//!
//! let ramp = Waveform::linear(0, Scalar::var("omega"), 2)
//!     .append(&Waveform::constant(Scalar::var("omega"), 1));
//!
//! let bindings = Bindings::new().with("omega", Decimal::from(10)).unwrap();
//! assert_eq!(ramp.duration(&bindings).unwrap(), Decimal::from(3));
//! assert_eq!(ramp.eval(Decimal::from(1), &bindings).unwrap(), Decimal::from(5));
//!
//! // Zero outside the support
//! assert_eq!(ramp.eval(Decimal::from(4), &bindings).unwrap(), Decimal::ZERO);
//! ```
//!
//! # Example: Recording a Value
//!
//! ```rust
//! use rydberg_ir::{Bindings, Scalar, Waveform};
//! use rust_decimal::Decimal;
//!
//! let w = Waveform::constant(5, 1)
//!     .record("a")
//!     .append(&Waveform::linear(Scalar::var("a"), 0, 1));
//!
//! let captured = w.scan_records(Bindings::new()).unwrap();
//! assert_eq!(captured.scalar("a").unwrap(), Decimal::from(5));
//! ```

pub mod arith;
pub mod bindings;
pub mod circuit;
pub mod error;
pub mod field;
pub mod pulse;
pub mod register;
pub mod scalar;
pub mod sequence;
pub mod waveform;

pub use bindings::{Bindings, ParamValue};
pub use circuit::{AnalogCircuit, BindingStatus};
pub use error::{IrError, IrResult};
pub use field::{Field, FieldName, SpatialModulation};
pub use pulse::{Pulse, PulseKind};
pub use register::{
    AtomArrangement, BravaisLattice, LatticeKind, ListOfLocations, ParallelRegister, Register,
    ResolvedSite, Site, bounding_box,
};
pub use scalar::{Interval, Scalar, ScalarKind};
pub use sequence::{LevelCoupling, Sequence, SequenceKind};
pub use waveform::{
    Alignment, FunctionWaveform, Interpolation, SmoothingKernel, Waveform, WaveformFn, WaveformKind,
};
