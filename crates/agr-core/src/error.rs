//! # Error Types
//!
//! Errors raised by the foundational types. Engine-level failures live in
//! `agr-agreement`; this module only covers arithmetic, time and
//! canonicalization problems.

use thiserror::Error;

/// Top-level error type for `agr-core`.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// An amount addition exceeded the representable range.
    #[error("amount overflow: {left} + {right}")]
    AmountOverflow {
        /// Left operand.
        left: u64,
        /// Right operand.
        right: u64,
    },

    /// An amount subtraction would go below zero.
    #[error("amount underflow: {left} - {right}")]
    AmountUnderflow {
        /// Minuend.
        left: u64,
        /// Subtrahend.
        right: u64,
    },

    /// A timestamp was malformed or out of range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Floats have no canonical form; amounts are integers or strings.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
