//! # Design
//!
//! - Codec failures are one enum so the executor can surface them as client errors.
//! - Pipeline errors wrap the collaborator errors unchanged; the HTTP layer inspects
//!   the wrapped variant to pick a status.

use imgrelay_cache::CacheError;
use imgrelay_fetch::FetchError;
use imgrelay_transform::TransformError;
use thiserror::Error;

use crate::variant::DimensionProblem;

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Result alias for pipeline execution.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised while decoding, transforming or encoding an image.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The source bytes are not a decodable image.
    #[error("failed to decode source image")]
    Decode {
        /// Underlying codec error.
        source: image::ImageError,
    },
    /// An operation cannot be applied to the current image.
    #[error("transform operation cannot be applied")]
    Apply {
        /// Normalized operation token.
        operation: String,
        /// Short machine-readable reason.
        reason: &'static str,
    },
    /// No encoder exists for the requested extension.
    #[error("unsupported output format")]
    UnsupportedFormat {
        /// Requested extension.
        extension: String,
    },
    /// Encoding the result failed.
    #[error("failed to encode image")]
    Encode {
        /// Requested extension.
        extension: String,
        /// Underlying codec error.
        source: image::ImageError,
    },
}

impl CodecError {
    pub(crate) fn apply(operation: impl ToString, reason: &'static str) -> Self {
        Self::Apply {
            operation: operation.to_string(),
            reason,
        }
    }
}

/// Errors raised by [`crate::Executor`] and variant construction.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The transform chain failed to parse.
    #[error("invalid transform chain")]
    InvalidChain {
        /// Underlying parse error.
        #[from]
        source: TransformError,
    },
    /// A cover or resize dimension was rejected.
    #[error("invalid dimension")]
    InvalidDimension {
        /// `width` or `height`.
        field: &'static str,
        /// What was wrong with the value.
        problem: DimensionProblem,
    },
    /// The source image could not be fetched.
    #[error("source fetch failed")]
    Fetch {
        /// Underlying fetch error.
        #[from]
        source: FetchError,
    },
    /// The variant could not be rendered.
    #[error("transform application failed")]
    TransformApply {
        /// Underlying codec error.
        #[from]
        source: CodecError,
    },
    /// The cache could not be read.
    #[error("cache lookup failed")]
    Cache {
        /// Underlying cache error.
        #[from]
        source: CacheError,
    },
    /// The blocking render task panicked or was cancelled.
    #[error("render task failed")]
    Join {
        /// Underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
