//! Request and outcome carriers for a single fetch.

use bytes::Bytes;

/// Source of an inbound proxy request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    /// Absolute source URL.
    pub url: String,
    /// Extension chosen by the client; wins over the upstream `Content-Type`.
    pub declared_extension: Option<String>,
}

impl RemoteRequest {
    /// Request `url` letting the upstream decide the content type.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            declared_extension: None,
        }
    }

    /// Override the content type with the MIME type of `extension`.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.declared_extension = Some(extension.into());
        self
    }
}

/// Buffered upstream body with its negotiated media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Entire response body.
    pub bytes: Bytes,
    /// Negotiated MIME type (always in the allowed set).
    pub mime_type: String,
    /// File extension matching `mime_type`, lowercase.
    pub extension: String,
}
