//! Layered configuration loading: defaults, optional JSON file, environment.
//!
//! # Design
//! - Lookups go through an injected function so tests never mutate the process
//!   environment.
//! - The file uses the proxy's historical key names (`mimeTypes`, `requestTimeout`,
//!   `cacheControlHeaderTTL`, ...); unknown keys are rejected.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{ProxyConfig, Whitelist};
use crate::validate::{parse_flag, parse_ip, parse_list, parse_number};

/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_PATH_ENV: &str = "IMGRELAY_CONFIG";

const ENV_BIND_ADDR: &str = "IMGRELAY_BIND_ADDR";
const ENV_PORT: &str = "IMGRELAY_PORT";
const ENV_PORT_FALLBACK: &str = "PORT";
const ENV_WHITELIST: &str = "IMGRELAY_WHITELIST";
const ENV_MIME_TYPES: &str = "IMGRELAY_MIME_TYPES";
const ENV_REQUEST_TIMEOUT: &str = "IMGRELAY_REQUEST_TIMEOUT";
const ENV_MAX_REDIRECTS: &str = "IMGRELAY_MAX_REDIRECTS";
const ENV_MAX_DIMENSION: &str = "IMGRELAY_MAX_DIMENSION";
const ENV_CACHE: &str = "IMGRELAY_CACHE";
const ENV_CACHE_FOLDER: &str = "IMGRELAY_CACHE_FOLDER";
const ENV_CACHE_CONTROL_TTL: &str = "IMGRELAY_CACHE_CONTROL_TTL";

/// Shape of the optional JSON configuration file; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ConfigFile {
    /// Listener address.
    pub bind_addr: Option<std::net::IpAddr>,
    /// Listener port.
    pub port: Option<u16>,
    /// Host suffixes or `/regex/` patterns.
    pub whitelist: Option<Vec<String>>,
    /// Allowed MIME types.
    pub mime_types: Option<Vec<String>>,
    /// Upstream header timeout in milliseconds.
    pub request_timeout: Option<u64>,
    /// Redirect hop bound.
    pub max_redirects: Option<usize>,
    /// Cover route dimension bound.
    pub max_dimension: Option<u32>,
    /// Cache toggle.
    pub cache: Option<bool>,
    /// Cache directory.
    pub cache_folder: Option<PathBuf>,
    /// `Cache-Control` max-age in seconds.
    #[serde(rename = "cacheControlHeaderTTL")]
    pub cache_control_header_ttl: Option<u64>,
}

impl ConfigFile {
    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or is not valid JSON.
    pub fn read(path: &Path) -> ConfigResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            operation: "config.read",
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply(self, config: &mut ProxyConfig) -> ConfigResult<()> {
        if let Some(bind_addr) = self.bind_addr {
            config.bind_addr = bind_addr;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(whitelist) = self.whitelist {
            config.whitelist = Whitelist::parse(whitelist)?;
        }
        if let Some(mime_types) = self.mime_types {
            config.mime_types = mime_types;
        }
        if let Some(timeout) = self.request_timeout {
            config.request_timeout = Duration::from_millis(timeout);
        }
        if let Some(max_redirects) = self.max_redirects {
            config.max_redirects = max_redirects;
        }
        if let Some(max_dimension) = self.max_dimension {
            config.max_dimension = max_dimension;
        }
        if let Some(cache) = self.cache {
            config.cache_enabled = cache;
        }
        if let Some(cache_folder) = self.cache_folder {
            config.cache_folder = cache_folder;
        }
        if let Some(ttl) = self.cache_control_header_ttl {
            config.cache_control_ttl = ttl;
        }
        Ok(())
    }
}

/// Load configuration from the process environment.
///
/// # Errors
///
/// Returns an error when the configuration file or any override is invalid.
pub fn load_from_env() -> ConfigResult<ProxyConfig> {
    load_with(|name| std::env::var(name).ok())
}

/// Load configuration using `lookup` to resolve environment variables.
///
/// # Errors
///
/// Returns an error when the configuration file or any override is invalid, or
/// when the merged configuration fails [`ProxyConfig::validate`].
pub fn load_with<F>(lookup: F) -> ConfigResult<ProxyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ProxyConfig::default();

    if let Some(path) = lookup(CONFIG_PATH_ENV).filter(|path| !path.trim().is_empty()) {
        let path = PathBuf::from(path);
        debug!(path = %path.display(), "loading configuration file");
        ConfigFile::read(&path)?.apply(&mut config)?;
    }

    apply_env(&mut config, &lookup)?;
    config.validate()?;
    Ok(config)
}

fn apply_env<F>(config: &mut ProxyConfig, lookup: &F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_BIND_ADDR) {
        config.bind_addr = parse_ip("bind_addr", &value)?;
    }
    if let Some(value) = lookup(ENV_PORT).or_else(|| lookup(ENV_PORT_FALLBACK)) {
        config.port = parse_number("port", &value)?;
    }
    if let Some(value) = lookup(ENV_WHITELIST) {
        config.whitelist = Whitelist::parse(parse_list(&value))?;
    }
    if let Some(value) = lookup(ENV_MIME_TYPES) {
        config.mime_types = parse_list(&value);
    }
    if let Some(value) = lookup(ENV_REQUEST_TIMEOUT) {
        config.request_timeout =
            Duration::from_millis(parse_number("request_timeout", &value)?);
    }
    if let Some(value) = lookup(ENV_MAX_REDIRECTS) {
        config.max_redirects = parse_number("max_redirects", &value)?;
    }
    if let Some(value) = lookup(ENV_MAX_DIMENSION) {
        config.max_dimension = parse_number("max_dimension", &value)?;
    }
    if let Some(value) = lookup(ENV_CACHE) {
        config.cache_enabled = parse_flag("cache", &value)?;
    }
    if let Some(value) = lookup(ENV_CACHE_FOLDER) {
        config.cache_folder = PathBuf::from(value);
    }
    if let Some(value) = lookup(ENV_CACHE_CONTROL_TTL) {
        config.cache_control_ttl = parse_number("cache_control_ttl", &value)?;
    }
    Ok(())
}
