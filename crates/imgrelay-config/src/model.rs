//! Typed proxy configuration.
//!
//! # Design
//! - Pure data handed to the fetch resolver and executor at construction time.
//! - Whitelist entries are compiled once while loading, never per request.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};

/// Fully resolved proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: IpAddr,
    /// Port the HTTP listener binds to.
    pub port: u16,
    /// Hosts a source URL may point at; empty means unrestricted.
    pub whitelist: Whitelist,
    /// MIME types the proxy agrees to serve.
    pub mime_types: Vec<String>,
    /// Time allowed for upstream response headers.
    pub request_timeout: Duration,
    /// Redirect hops followed before failing.
    pub max_redirects: usize,
    /// Largest width or height accepted by the cover route.
    pub max_dimension: u32,
    /// Whether transformed variants are persisted.
    pub cache_enabled: bool,
    /// Directory holding cached variants.
    pub cache_folder: PathBuf,
    /// `Cache-Control` max-age sent to clients, in seconds.
    pub cache_control_ttl: u64,
    /// `User-Agent` sent upstream.
    pub user_agent: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: defaults::BIND_ADDR,
            port: defaults::PORT,
            whitelist: Whitelist::default(),
            mime_types: defaults::MIME_TYPES
                .iter()
                .map(ToString::to_string)
                .collect(),
            request_timeout: Duration::from_millis(defaults::REQUEST_TIMEOUT_MS),
            max_redirects: defaults::MAX_REDIRECTS,
            max_dimension: defaults::MAX_DIMENSION,
            cache_enabled: true,
            cache_folder: PathBuf::from(defaults::CACHE_FOLDER),
            cache_control_ttl: defaults::CACHE_CONTROL_TTL_SECS,
            user_agent: defaults::user_agent(),
        }
    }
}

impl ProxyConfig {
    /// Reject values the proxy cannot operate with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(invalid("port", "zero", Some(self.port.to_string())));
        }
        if self.request_timeout.is_zero() {
            return Err(invalid("request_timeout", "zero", None));
        }
        if self.max_dimension == 0 {
            return Err(invalid("max_dimension", "zero", None));
        }
        if self.mime_types.is_empty() {
            return Err(invalid("mime_types", "empty", None));
        }
        if let Some(bad) = self
            .mime_types
            .iter()
            .find(|mime| !mime.contains('/') || mime.contains(char::is_whitespace))
        {
            return Err(invalid("mime_types", "malformed", Some(bad.clone())));
        }
        if self.cache_enabled && self.cache_folder.as_os_str().is_empty() {
            return Err(invalid("cache_folder", "empty", None));
        }
        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "empty", None));
        }
        Ok(())
    }

    /// Whether `mime` is in the allowed set.
    #[must_use]
    pub fn allows_mime(&self, mime: &str) -> bool {
        self.mime_types.iter().any(|allowed| allowed == mime)
    }
}

fn invalid(field: &'static str, reason: &'static str, value: Option<String>) -> ConfigError {
    ConfigError::InvalidField {
        field,
        reason,
        value,
    }
}

/// A single whitelist rule.
#[derive(Clone)]
pub enum WhitelistEntry {
    /// Right-anchored host suffix on a label boundary (`example.com` matches
    /// `example.com` and `img.example.com`, not `evilexample.com`).
    Suffix(String),
    /// Precompiled pattern tested against the whole host name.
    Pattern(Regex),
}

impl WhitelistEntry {
    /// Parse a configured entry; `/…/` wraps a regular expression, anything
    /// else is a host suffix.
    ///
    /// # Errors
    ///
    /// Returns an error for empty entries and patterns that fail to compile.
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let raw = raw.trim();
        if let Some(pattern) = raw
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
            .filter(|pattern| !pattern.is_empty())
        {
            return Regex::new(pattern)
                .map(Self::Pattern)
                .map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                });
        }
        let suffix = raw.trim_start_matches('.').to_ascii_lowercase();
        if suffix.is_empty() {
            return Err(invalid("whitelist", "empty_entry", Some(raw.to_string())));
        }
        Ok(Self::Suffix(suffix))
    }

    /// Whether `host` satisfies this rule.
    #[must_use]
    pub fn matches(&self, host: &str) -> bool {
        match self {
            Self::Suffix(suffix) => host_has_suffix(host.trim_end_matches('.'), suffix),
            Self::Pattern(pattern) => pattern.is_match(host),
        }
    }
}

fn host_has_suffix(host: &str, suffix: &str) -> bool {
    if host.eq_ignore_ascii_case(suffix) {
        return true;
    }
    let Some(boundary) = host.len().checked_sub(suffix.len() + 1) else {
        return false;
    };
    host.as_bytes()[boundary] == b'.'
        && host
            .get(boundary + 1..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}

impl fmt::Debug for WhitelistEntry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suffix(suffix) => formatter.debug_tuple("Suffix").field(suffix).finish(),
            Self::Pattern(pattern) => formatter
                .debug_tuple("Pattern")
                .field(&pattern.as_str())
                .finish(),
        }
    }
}

/// Ordered set of whitelist rules.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: Vec<WhitelistEntry>,
}

impl Whitelist {
    /// Build a whitelist from already-parsed entries.
    #[must_use]
    pub const fn new(entries: Vec<WhitelistEntry>) -> Self {
        Self { entries }
    }

    /// Parse every raw entry.
    ///
    /// # Errors
    ///
    /// Returns the first entry that fails to parse.
    pub fn parse<I, S>(raw: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter()
            .filter(|entry| !entry.as_ref().trim().is_empty())
            .map(|entry| WhitelistEntry::parse(entry.as_ref()))
            .collect::<ConfigResult<Vec<_>>>()
            .map(Self::new)
    }

    /// Whether no restriction applies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured rules in order.
    #[must_use]
    pub fn entries(&self) -> &[WhitelistEntry] {
        &self.entries
    }

    /// Whether `host` may be fetched: always when empty, otherwise when any rule matches.
    #[must_use]
    pub fn permits(&self, host: &str) -> bool {
        self.is_empty() || self.entries.iter().any(|entry| entry.matches(host))
    }
}
