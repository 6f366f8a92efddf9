//! Error types for the fingerprinting and matching core.

use thiserror::Error;

/// Result type alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error taxonomy.
///
/// Every operation reports failure through its return value; the core
/// never logs, retries, or swallows an error on the caller's behalf.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors: surfaced to the caller, never retried internally.
    #[error("input is corrupt: {non_finite_fraction:.4} of samples were non-finite")]
    CorruptInput { non_finite_fraction: f32 },

    #[error("input shorter than one segment ({available} samples, need {required})")]
    TooShort { available: usize, required: usize },

    #[error("segment too short for one full FFT frame ({available} samples, need {required})")]
    SegmentTooShort { available: usize, required: usize },

    #[error("spectrum is degenerate (max magnitude {max_magnitude} below epsilon)")]
    DegenerateSpectrum { max_magnitude: f32 },

    // Usage errors: programmer mistakes, unrecoverable by definition.
    #[error("signatures were produced under different params: {a:?} vs {b:?}")]
    ParamsMismatch {
        a: crate::types::SignatureParams,
        b: crate::types::SignatureParams,
    },

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Capacity errors: cooperative, no rollback required.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("operation cancelled")]
    Cancelled,

    // Blob decode errors (external signature store boundary).
    #[error("malformed signature blob: {0}")]
    MalformedBlob(String),
}

impl Error {
    /// Returns true if this error reflects bad or unusable input data,
    /// as opposed to a programmer or capacity error.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::CorruptInput { .. }
                | Error::TooShort { .. }
                | Error::SegmentTooShort { .. }
                | Error::DegenerateSpectrum { .. }
        )
    }

    /// Returns a stable, short error code for structured logging/metrics
    /// consumption by the embedder.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::CorruptInput { .. } => "CORRUPT_INPUT",
            Error::TooShort { .. } => "TOO_SHORT",
            Error::SegmentTooShort { .. } => "SEGMENT_TOO_SHORT",
            Error::DegenerateSpectrum { .. } => "DEGENERATE_SPECTRUM",
            Error::ParamsMismatch { .. } => "PARAMS_MISMATCH",
            Error::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Error::Cancelled => "CANCELLED",
            Error::MalformedBlob(_) => "MALFORMED_BLOB",
        }
    }
}
