//! # Design
//!
//! - A single error type for chain parsing; the whole chain is rejected on the first bad token.
//! - Messages stay constant; the offending token and a machine-readable reason travel as fields.

use thiserror::Error;

/// Result alias for transform-language operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Errors raised while parsing a transform chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// A token in the chain was malformed.
    #[error("invalid transform operation")]
    InvalidOperation {
        /// Token exactly as it appeared in the chain (trimmed).
        token: String,
        /// Machine-readable reason for the rejection.
        reason: &'static str,
    },
}

impl TransformError {
    pub(crate) fn invalid(token: &str, reason: &'static str) -> Self {
        Self::InvalidOperation {
            token: token.to_string(),
            reason,
        }
    }

    /// Offending token.
    #[must_use]
    pub fn token(&self) -> &str {
        match self {
            Self::InvalidOperation { token, .. } => token,
        }
    }

    /// Machine-readable rejection reason.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidOperation { reason, .. } => reason,
        }
    }
}
