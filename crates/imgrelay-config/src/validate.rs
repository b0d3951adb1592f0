//! Parsing helpers for textual configuration values (environment overrides).

use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};

pub(crate) fn parse_number<T: FromStr>(field: &'static str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidField {
            field,
            reason: "not_a_number",
            value: Some(value.to_string()),
        })
}

pub(crate) fn parse_flag(field: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidField {
            field,
            reason: "not_a_flag",
            value: Some(value.to_string()),
        }),
    }
}

pub(crate) fn parse_ip(field: &'static str, value: &str) -> ConfigResult<IpAddr> {
    value
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::InvalidField {
            field,
            reason: "not_an_ip_address",
            value: Some(value.to_string()),
        })
}

/// Split a comma-separated list, dropping blank items.
pub(crate) fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}
