//! Shared HTTP constants (headers, problem URIs).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_CACHE_STATUS: &str = "x-imgrelay-cache";

pub(crate) const CONTENT_TYPE_PROBLEM: &str = "application/problem+json";
pub(crate) const CONTENT_TYPE_METRICS: &str = "text/plain; version=0.0.4";

pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://imgrelay.dev/problems/bad-request";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://imgrelay.dev/problems/not-found";
pub(crate) const PROBLEM_UPSTREAM_TIMEOUT: &str = "https://imgrelay.dev/problems/upstream-timeout";
pub(crate) const PROBLEM_INTERNAL: &str = "https://imgrelay.dev/problems/internal";
