//! # Design
//!
//! - Constant-message errors; paths and operation names are carried as fields.
//! - A missing entry is not an error: lookups report `CacheLookup::Miss` instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by cache key derivation and storage.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A key component contained characters that are unsafe in a file name.
    #[error("invalid cache key")]
    InvalidKey {
        /// Key component that failed validation.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// Filesystem access failed.
    #[error("cache io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}
