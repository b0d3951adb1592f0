//! Resolution of `Location` headers against the original request.
//!
//! Any of scheme, host, port or fragment missing from the redirect target is
//! taken from the *original* request, not from the hop that issued the redirect.

use url::{ParseError, Url};

use crate::error::{FetchError, FetchResult};

/// Resolve `location` into an absolute URL, inheriting absent parts from `original`.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] when the location cannot be made absolute.
pub fn resolve_redirect(original: &Url, location: &str) -> FetchResult<Url> {
    let location = location.trim();
    let mut target = match Url::parse(location) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => relative_to_origin(original, location)?,
        Err(source) => {
            return Err(FetchError::InvalidUrl {
                url: location.to_string(),
                source,
            });
        }
    };

    // `Url` drops a default port, so the raw authority decides whether one was given.
    if !declares_port(location) && original.port().is_some() {
        // Only fails for URLs that cannot carry a port, which the scheme check rejects later.
        let _ = target.set_port(original.port());
    }
    if target.fragment().is_none() {
        target.set_fragment(original.fragment());
    }
    Ok(target)
}

fn declares_port(location: &str) -> bool {
    let rest = match location.split_once("//") {
        Some((prefix, rest)) if prefix.is_empty() || is_scheme_prefix(prefix) => rest,
        _ => return false,
    };
    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host_port)| host_port);
    let after_host = if host_port.starts_with('[') {
        host_port.split_once(']').map_or("", |(_, rest)| rest)
    } else {
        host_port
    };
    after_host
        .split_once(':')
        .is_some_and(|(_, port)| !port.is_empty())
}

fn is_scheme_prefix(prefix: &str) -> bool {
    prefix.strip_suffix(':').is_some_and(|scheme| {
        scheme.starts_with(|ch: char| ch.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
    })
}

fn relative_to_origin(original: &Url, location: &str) -> FetchResult<Url> {
    let candidate = if location.starts_with("//") {
        format!("{}:{location}", original.scheme())
    } else {
        let mut origin = original.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        let path = if location.starts_with('/') {
            location.to_string()
        } else {
            format!("/{location}")
        };
        return origin
            .join(&path)
            .map_err(|source| FetchError::InvalidUrl {
                url: location.to_string(),
                source,
            });
    };
    Url::parse(&candidate).map_err(|source| FetchError::InvalidUrl {
        url: location.to_string(),
        source,
    })
}
