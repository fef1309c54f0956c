//! Error types for the IR crate.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur while building, evaluating or rewriting IR nodes.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum IrError {
    /// A variable was evaluated without a value in the bindings.
    #[error("Variable '{0}' is unbound")]
    UnboundVariable(String),

    /// A variable was assigned a second time.
    #[error("Variable '{name}' is already assigned{}", format_previous(.previous))]
    DuplicateAssignment {
        /// Name of the variable.
        name: String,
        /// Value it already carries, when known.
        previous: Option<Decimal>,
    },

    /// A scalar variable received a vector value, or the other way round.
    #[error("Variable '{name}' expects a {expected} value")]
    TypeMismatch {
        /// Name of the variable.
        name: String,
        /// The kind of value the variable needs ("scalar" or "vector").
        expected: &'static str,
    },

    /// Division by a zero-valued expression.
    #[error("Division by zero in '{0}'")]
    DivisionByZero(String),

    /// Decimal arithmetic overflowed.
    #[error("Arithmetic overflow in '{0}'")]
    ArithmeticOverflow(String),

    /// A slice interval does not fit inside its operand.
    #[error("Invalid slice [{start}, {stop}] of a waveform with duration {duration}")]
    InvalidSlice {
        /// Resolved start of the interval.
        start: Decimal,
        /// Resolved stop of the interval.
        stop: Decimal,
        /// Duration of the sliced operand.
        duration: Decimal,
    },

    /// A floating point value (from a user function or kernel) was NaN or infinite.
    #[error("Non-finite value {value} produced by '{source_name}'")]
    NonFiniteValue {
        /// Name of the producer.
        source_name: String,
        /// The offending value.
        value: f64,
    },

    /// An append node was constructed without children.
    #[error("Cannot build an empty append")]
    EmptyAppend,

    /// A constructor argument is out of its domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

#[allow(clippy::ref_option)]
fn format_previous(previous: &Option<Decimal>) -> String {
    match previous {
        Some(value) => format!(" (value: {value})"),
        None => String::new(),
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
