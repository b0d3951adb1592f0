//! Cache key derivation.
//!
//! A key is `hex(sha256(source bytes))`, followed by the literal transform
//! signature and the target extension, e.g. `<digest>re-200x200.jpg`. The
//! signature is embedded verbatim rather than hashed.

use std::fmt::{self, Display, Formatter};

use sha2::{Digest, Sha256};

use crate::error::{CacheError, CacheResult};

/// Signature used when no transform applies to a variant.
pub const NO_TRANSFORM_MARKER: &str = "_";

/// Address of a cached variant; always a single safe file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `content` transformed by `signature` into `extension`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidKey`] when the signature or extension holds
    /// characters outside the file-name-safe set.
    pub fn derive(content: &[u8], signature: Option<&str>, extension: &str) -> CacheResult<Self> {
        let signature = signature.unwrap_or(NO_TRANSFORM_MARKER);
        if signature.is_empty() || !signature.chars().all(is_signature_char) {
            return Err(CacheError::InvalidKey {
                field: "signature",
                value: signature.to_string(),
            });
        }
        if extension.is_empty() || !extension.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(CacheError::InvalidKey {
                field: "extension",
                value: extension.to_string(),
            });
        }
        Ok(Self(format!(
            "{}{signature}.{}",
            content_digest(content),
            extension.to_ascii_lowercase()
        )))
    }

    /// Key rendered as the stored file name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Lowercase hex SHA-256 of the full byte sequence.
#[must_use]
pub fn content_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

const fn is_signature_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | ',' | '_')
}
