//! Error types for the compilation crate.

use rust_decimal::Decimal;
use rydberg_hal::HalError;
use rydberg_ir::{IrError, LevelCoupling};
use thiserror::Error;

/// Errors that can occur during compilation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// Error from the IR crate.
    #[error("IR error: {0}")]
    Ir(#[from] IrError),

    /// Error from the HAL crate.
    #[error("HAL error: {0}")]
    Hal(#[from] HalError),

    /// Batch columns have different lengths.
    #[error("Batch parameter '{name}' has {found} values, expected {expected}")]
    BatchLengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// Wrong number of flattened arguments.
    #[error("Expected {expected} arguments, got {found}")]
    ArgumentCountMismatch { expected: usize, found: usize },

    /// Variables left without a value after binding and record capture.
    #[error("Missing assignments for: {}", .0.join(", "))]
    MissingAssignments(Vec<String>),

    /// A stage that needs a fully bound circuit received free variables.
    #[error("Circuit is not fully assigned, free: {}", .0.join(", "))]
    NotFullyAssigned(Vec<String>),

    /// Present channels of one parallel block have different durations.
    #[error("Channel {channel} lasts {duration}, expected {expected}")]
    ChannelDurationMismatch {
        channel: String,
        duration: Decimal,
        expected: Decimal,
    },

    /// A segment of a piecewise-constant channel is not constant.
    #[error("Segment {index} of {channel} is not constant")]
    NonConstantSegment { channel: String, index: usize },

    /// A segment of a piecewise-linear channel is not linear.
    #[error("Segment {index} of {channel} is not linear")]
    NonLinearSegment { channel: String, index: usize },

    /// A piecewise-linear channel jumps at a breakpoint.
    #[error("{channel} jumps from {left} to {right} at t={time}")]
    DiscontinuousWaveform {
        channel: String,
        time: Decimal,
        left: Decimal,
        right: Decimal,
    },

    /// The target cannot drive this channel with this modulation.
    #[error("{channel} does not support {modulation} modulation")]
    UnsupportedSpatialModulation { channel: String, modulation: String },

    /// More than one non-uniform modulation drives a field.
    #[error("{channel} has {count} local modulations, at most one is supported")]
    MultipleLocalModulations { channel: String, count: usize },

    /// A scaled location refers to a site the register does not have.
    #[error("Location {index} is outside a register of {n_sites} sites")]
    LocationOutOfRange { index: usize, n_sites: usize },

    /// A run-time vector does not have one entry per site.
    #[error("Vector '{name}' has {found} entries, register has {expected} sites")]
    VectorLengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// The register has more sites than the device.
    #[error("Register has {count} sites, device supports {max}")]
    TooManySites { count: usize, max: usize },

    /// The register is wider than the field of view.
    #[error("Register width {width} exceeds maximum {max_width}")]
    RegisterTooWide { width: Decimal, max_width: Decimal },

    /// The register is taller than the field of view.
    #[error("Register height {height} exceeds maximum {max_height}")]
    RegisterTooTall { height: Decimal, max_height: Decimal },

    /// Two sites are closer than the minimum spacing.
    #[error("Sites {first} and {second} are {distance} apart, minimum is {min}")]
    SitesTooClose {
        first: usize,
        second: usize,
        distance: Decimal,
        min: Decimal,
    },

    /// The target does not support this level coupling.
    #[error("Level coupling '{0}' is not supported by the target")]
    UnsupportedLevelCoupling(LevelCoupling),

    /// Code generation met a composite node where a leaf segment was expected.
    #[error("Unflattened composition in {0}")]
    UnflattenedComposition(String),

    /// A value is outside the device range.
    #[error("{channel} value {value} outside [{min}, {max}]")]
    ValueOutOfRange {
        channel: String,
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },

    /// The program is longer than the device allows.
    #[error("Duration {duration} exceeds maximum {max}")]
    DurationTooLong { duration: Decimal, max: Decimal },

    /// Two breakpoints of a channel are closer than the device time step.
    #[error("{channel} breakpoints {gap} apart, minimum is {min}")]
    TimeStepTooShort {
        channel: String,
        gap: Decimal,
        min: Decimal,
    },

    /// Code generation received a sequence that was not normalized.
    #[error("Sequence is not normalized: {0}")]
    NotNormalized(String),

    /// A validation pass ran without target capabilities.
    #[error("Target capabilities not set")]
    MissingCapabilities,

    /// The register has no sites.
    #[error("Register has no sites")]
    EmptyRegister,

    /// Pass execution failed.
    #[error("Pass '{name}' failed: {reason}")]
    PassFailed { name: String, reason: String },

    /// Invalid compiler configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_assignments_lists_all_names() {
        let err = CompileError::MissingAssignments(vec!["x".into(), "y".into()]);
        assert_eq!(err.to_string(), "Missing assignments for: x, y");
    }

    #[test]
    fn test_ir_error_converts() {
        let err: CompileError = IrError::UnboundVariable("t".into()).into();
        assert!(matches!(err, CompileError::Ir(IrError::UnboundVariable(_))));
    }
}
