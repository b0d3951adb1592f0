//! # Design
//!
//! - One error per rejection the resolver can produce; the HTTP layer maps them to
//!   statuses without string matching.
//! - Messages are constant; URLs, hosts, statuses and MIME types ride in fields.

use std::time::Duration;

use thiserror::Error;

/// Result alias for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors raised while resolving a remote image.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The target could not be parsed as a URL.
    #[error("invalid source url")]
    InvalidUrl {
        /// Target as supplied.
        url: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
    /// The target scheme is not `http` or `https`.
    #[error("unsupported url scheme")]
    Scheme {
        /// Target URL.
        url: String,
        /// Scheme found on the target (empty when absent).
        scheme: String,
    },
    /// The target has no host.
    #[error("missing url host")]
    Host {
        /// Target URL.
        url: String,
    },
    /// The target host matched no whitelist entry.
    #[error("host not whitelisted")]
    Whitelist {
        /// Rejected host.
        host: String,
    },
    /// More redirects were chased than allowed.
    #[error("too many redirects")]
    RedirectLoop {
        /// Last redirect target seen.
        url: String,
        /// Hops followed before giving up.
        hops: usize,
    },
    /// The upstream answered with a terminal status other than 200.
    #[error("unexpected upstream status")]
    UpstreamStatus {
        /// URL that produced the status.
        url: String,
        /// Status code returned.
        status: u16,
    },
    /// The negotiated MIME type is not in the allowed set.
    #[error("unsupported content type")]
    UnsupportedMime {
        /// Negotiated MIME type.
        mime: String,
        /// Allowed MIME types.
        allowed: Vec<String>,
    },
    /// Response headers did not arrive before the timeout fired.
    #[error("upstream request timed out")]
    Timeout {
        /// URL being requested when the timer fired.
        url: String,
        /// Configured timeout.
        after: Duration,
    },
    /// The HTTP client failed to send the request or read the body.
    #[error("upstream transport failure")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// URL being requested.
        url: String,
        /// Underlying client error.
        source: reqwest::Error,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build http client")]
    ClientBuild {
        /// Underlying client error.
        source: reqwest::Error,
    },
    /// The request was torn down before either the response or the timer settled it.
    #[error("upstream request interrupted")]
    Interrupted {
        /// URL being requested.
        url: String,
    },
}
