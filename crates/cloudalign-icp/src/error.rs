use cloudalign_linalg::{RigidFitError, TransformError};
use thiserror::Error;

/// Error type for registration operations.
///
/// No variant is retried internally: the algorithm is deterministic given
/// its inputs, so every failure is surfaced immediately with the offending
/// shapes or parameter.
#[derive(Debug, Error, PartialEq)]
pub enum IcpError {
    /// Inputs disagree in cardinality or dimensionality, or are empty.
    #[error("dimension mismatch: source is {src_len}x{src_dim}, target is {dst_len}x{dst_dim}")]
    DimensionMismatch {
        /// Number of source points.
        src_len: usize,
        /// Source point dimension.
        src_dim: usize,
        /// Number of target points (or the dimension of a supplied
        /// transform, when the mismatch is against a pose).
        dst_len: usize,
        /// Target point dimension.
        dst_dim: usize,
    },
    /// Nonsensical caller parameters, e.g. a zero iteration budget.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Which parameter is invalid and why.
        reason: String,
    },
    /// Input the solver genuinely cannot process, e.g. non-finite
    /// coordinates.
    #[error("degenerate input: {reason}")]
    DegenerateInput {
        /// Which check failed.
        reason: String,
    },
}

impl From<RigidFitError> for IcpError {
    fn from(e: RigidFitError) -> Self {
        match e {
            RigidFitError::DimensionMismatch {
                src_len,
                src_dim,
                dst_len,
                dst_dim,
            } => IcpError::DimensionMismatch {
                src_len,
                src_dim,
                dst_len,
                dst_dim,
            },
            RigidFitError::DegenerateInput { reason } => IcpError::DegenerateInput { reason },
        }
    }
}

impl From<TransformError> for IcpError {
    fn from(e: TransformError) -> Self {
        IcpError::InvalidConfiguration {
            reason: e.to_string(),
        }
    }
}
