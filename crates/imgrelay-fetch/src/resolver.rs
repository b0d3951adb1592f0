//! Remote image resolution.
//!
//! # Design
//! - Every hop (the original target and each redirect) is re-validated: scheme,
//!   host and whitelist, in that order, before any network traffic.
//! - Redirects are chased manually so the hop count and per-hop validation stay
//!   under our control; the client itself never follows a `Location`.
//! - Each issued request arms its own header timer. The network task and the timer
//!   race to settle a one-shot cell; the loser is a no-op and a late response is
//!   dropped without reaching the caller.
//! - Dropping the returned future aborts both tasks, cancelling the upstream fetch
//!   when the inbound connection goes away.

use std::sync::Arc;

use imgrelay_config::ProxyConfig;
use reqwest::header::{ACCEPT, CONNECTION, CONTENT_TYPE, HeaderMap, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};
use url::{ParseError, Url};

use crate::error::{FetchError, FetchResult};
use crate::media::{self, DEFAULT_MIME};
use crate::model::{FetchOutcome, RemoteRequest};
use crate::redirect::resolve_redirect;
use crate::settle::{AbortOnDrop, Settlement};

enum Settled {
    Response(Result<Response, reqwest::Error>),
    TimedOut,
}

/// Fetches source images under the proxy's whitelist, MIME and timeout policy.
#[derive(Debug, Clone)]
pub struct FetchResolver {
    client: Client,
    policy: Arc<ProxyConfig>,
}

impl FetchResolver {
    /// Build a resolver from the proxy configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when the HTTP client cannot be constructed.
    pub fn new(config: &ProxyConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .pool_max_idle_per_host(0)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;
        Ok(Self {
            client,
            policy: Arc::new(config.clone()),
        })
    }

    /// Fetch `request`, following up to the configured number of redirects.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] describing the first rejection: an invalid,
    /// non-HTTP, hostless or non-whitelisted target (on any hop), too many
    /// redirects, a non-200 terminal status, a disallowed MIME type, a timeout
    /// before response headers, or a transport failure.
    pub async fn fetch(&self, request: &RemoteRequest) -> FetchResult<FetchOutcome> {
        let original = parse_target(&request.url)?;
        let mut current = original.clone();
        let mut hops = 0_usize;

        let response = loop {
            self.validate_target(&current)?;
            let response = self.send(&current).await?;
            let status = response.status();

            if matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND) {
                if let Some(location) = header_text(response.headers(), LOCATION.as_str()) {
                    if hops >= self.policy.max_redirects {
                        warn!(url = %current, hops, "redirect limit reached");
                        return Err(FetchError::RedirectLoop {
                            url: current.to_string(),
                            hops,
                        });
                    }
                    let next = resolve_redirect(&original, &location)?;
                    hops += 1;
                    debug!(from = %current, to = %next, hops, "following upstream redirect");
                    current = next;
                    continue;
                }
            }

            if status != StatusCode::OK {
                warn!(url = %current, status = status.as_u16(), "upstream returned non-200 status");
                return Err(FetchError::UpstreamStatus {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
            }
            break response;
        };

        let (mime_type, extension) =
            self.negotiate(request.declared_extension.as_deref(), response.headers())?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                operation: "fetch.body",
                url: current.to_string(),
                source,
            })?;
        debug!(url = %current, mime = %mime_type, size = bytes.len(), "fetched source image");
        Ok(FetchOutcome {
            bytes,
            mime_type,
            extension,
        })
    }

    fn validate_target(&self, url: &Url) -> FetchResult<()> {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            warn!(url = %url, scheme, "rejected non-http source");
            return Err(FetchError::Scheme {
                url: url.to_string(),
                scheme: scheme.to_string(),
            });
        }
        let host = url.host_str().unwrap_or_default();
        if host.is_empty() {
            return Err(FetchError::Host {
                url: url.to_string(),
            });
        }
        if !self.policy.whitelist.permits(host) {
            warn!(host, "rejected source host outside whitelist");
            return Err(FetchError::Whitelist {
                host: host.to_string(),
            });
        }
        Ok(())
    }

    async fn send(&self, url: &Url) -> FetchResult<Response> {
        let (cell, receiver) = Settlement::new();
        let request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "*/*")
            .header(CONNECTION, "close");

        let network = {
            let cell = Arc::clone(&cell);
            let target = url.to_string();
            AbortOnDrop(tokio::spawn(async move {
                let result = request.send().await;
                if !cell.settle(Settled::Response(result)) {
                    debug!(url = %target, "discarding upstream response that lost to the timer");
                }
            }))
        };
        let timer = {
            let after = self.policy.request_timeout;
            AbortOnDrop(tokio::spawn(async move {
                tokio::time::sleep(after).await;
                cell.settle(Settled::TimedOut);
            }))
        };

        let settled = receiver.await;
        drop(timer);

        match settled {
            Ok(Settled::Response(Ok(response))) => Ok(response),
            Ok(Settled::Response(Err(source))) => Err(FetchError::Transport {
                operation: "fetch.send",
                url: url.to_string(),
                source,
            }),
            Ok(Settled::TimedOut) => {
                drop(network);
                warn!(
                    url = %url,
                    timeout_ms = self.policy.request_timeout.as_millis(),
                    "upstream request timed out"
                );
                Err(FetchError::Timeout {
                    url: url.to_string(),
                    after: self.policy.request_timeout,
                })
            }
            Err(_) => Err(FetchError::Interrupted {
                url: url.to_string(),
            }),
        }
    }

    fn negotiate(
        &self,
        declared_extension: Option<&str>,
        headers: &HeaderMap,
    ) -> FetchResult<(String, String)> {
        let (mime, extension) = match declared_extension {
            Some(declared) => {
                let extension = declared.trim_start_matches('.').to_ascii_lowercase();
                let mime = media::mime_for_extension(&extension).unwrap_or(DEFAULT_MIME);
                (mime.to_string(), Some(extension))
            }
            None => {
                let mime = media::essence(
                    &header_text(headers, CONTENT_TYPE.as_str()).unwrap_or_default(),
                );
                let extension = media::extension_for_mime(&mime).map(str::to_string);
                (mime, extension)
            }
        };

        match extension {
            Some(extension) if self.policy.allows_mime(&mime) => {
                Ok((mime, extension))
            }
            _ => {
                warn!(mime = %mime, "rejected upstream content type");
                Err(FetchError::UnsupportedMime {
                    mime,
                    allowed: self.policy.mime_types.clone(),
                })
            }
        }
    }
}

fn parse_target(raw: &str) -> FetchResult<Url> {
    Url::parse(raw.trim()).map_err(|source| match source {
        ParseError::RelativeUrlWithoutBase => FetchError::Scheme {
            url: raw.to_string(),
            scheme: String::new(),
        },
        ParseError::EmptyHost => FetchError::Host {
            url: raw.to_string(),
        },
        source => FetchError::InvalidUrl {
            url: raw.to_string(),
            source,
        },
    })
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
