//! Built-in configuration values.

use std::net::{IpAddr, Ipv4Addr};

/// Loopback listener address.
pub const BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
/// Listener port.
pub const PORT: u16 = 5000;
/// MIME types served unless configured otherwise.
pub const MIME_TYPES: &[&str] = &["image/gif", "image/jpeg", "image/png", "image/webp"];
/// Upstream header timeout in milliseconds.
pub const REQUEST_TIMEOUT_MS: u64 = 5_000;
/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 5;
/// Upper bound for the cover route's width and height.
pub const MAX_DIMENSION: u32 = 1_000;
/// Cache directory, relative to the working directory.
pub const CACHE_FOLDER: &str = "cache";
/// `Cache-Control` max-age in seconds (one year).
pub const CACHE_CONTROL_TTL_SECS: u64 = 31_536_000;

/// `User-Agent` sent upstream: `<product>/<version>`.
#[must_use]
pub fn user_agent() -> String {
    format!("imgrelay/{}", env!("CARGO_PKG_VERSION"))
}
