//! Error taxonomy for expression construction, dispatch, and realization.
//!
//! Backend *rejection* is deliberately absent here: a backend declining a
//! request is routine fallback, modeled by [`crate::backend::Dispatch`], and
//! never travels on the error channel. Everything in this enum is terminal
//! and propagates to the caller unchanged.

use num_bigint::BigInt;
use thiserror::Error;

use crate::op::OpCode;

/// Terminal error raised by the expression layer.
#[derive(Error, Debug)]
pub enum SymbexError {
    /// A binary bit-vector operation was applied to operands of differing
    /// widths.
    #[error("bit-vectors are differently sized ({lhs} and {rhs})")]
    WidthMismatch {
        /// Width of the left operand.
        lhs: u32,
        /// Width of the right operand.
        rhs: u32,
    },

    /// Every registered backend rejected an operator application.
    #[error("no backend can handle operation {op}")]
    UnsupportedOperation {
        /// The operation that could not be dispatched.
        op: OpCode,
    },

    /// Every registered backend rejected an abstraction request.
    #[error("abstraction failed with available backends")]
    AbstractionFailure,

    /// Every registered backend rejected a conversion request.
    #[error("no backend can convert value {value}")]
    ConversionFailure {
        /// Display form of the value that could not be converted.
        value: String,
    },

    /// Every registered backend rejected a simplification request.
    #[error("no backend can simplify the expression")]
    SimplificationFailure,

    /// The handle holds neither a realized value nor an AST.
    #[error("expression holds neither a realized value nor an AST")]
    UnresolvedExpression,

    /// A split was requested on a node whose operands are not all
    /// first-class sub-expressions.
    #[error("cannot split {op}: operands are not all sub-expressions")]
    MalformedSplit {
        /// The top-level operation of the node being split.
        op: OpCode,
    },

    /// `chop` was called with a chunk width that does not evenly divide the
    /// expression length.
    #[error("expression length ({len}) is not a multiple of {chunk}")]
    InvalidChopWidth {
        /// Bit length of the expression.
        len: u32,
        /// Requested chunk width.
        chunk: u32,
    },

    /// A reload key could not be resolved by the persistence collaborator.
    #[error("no stored expression for key {key}")]
    Persistence {
        /// The unresolvable key.
        key: String,
    },

    /// Division or remainder with a zero divisor.
    #[error("bit-vector division by zero")]
    DivisionByZero,

    /// A shift or rotation amount outside the representable range.
    #[error("invalid shift amount {amount}")]
    InvalidShift {
        /// The offending amount, in its signed interpretation.
        amount: BigInt,
    },

    /// An extraction range that is inverted or exceeds the operand width.
    #[error("invalid extract range [{low}, {high}] on width {width}")]
    InvalidExtract {
        /// High (most significant) bit of the range, inclusive.
        high: u32,
        /// Low (least significant) bit of the range, inclusive.
        low: u32,
        /// Width of the operand being extracted from.
        width: u32,
    },

    /// A bit-vector value was constructed with a zero width.
    #[error("bit-vector width must be positive")]
    InvalidWidth,

    /// An operator was applied to the wrong number of operands.
    #[error("operation {op} expects {expected} operands, got {found}")]
    Arity {
        /// The operation being applied.
        op: OpCode,
        /// Operand count the registry requires.
        expected: usize,
        /// Operand count actually supplied.
        found: usize,
    },

    /// The width of an expression could not be determined from its value or
    /// structure (e.g. a boolean-sorted expression).
    #[error("expression has no determinable bit width")]
    IndeterminateWidth,

    /// A backend failed in a way that is not a rejection.
    #[error("backend {backend} failed: {message}")]
    Backend {
        /// Name of the failing backend.
        backend: &'static str,
        /// Backend-supplied failure description.
        message: String,
    },
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, SymbexError>;
