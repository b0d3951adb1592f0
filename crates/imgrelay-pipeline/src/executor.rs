//! Pipeline executor.
//!
//! # Design
//! - `Start -> Fetching -> (CacheLookup | Failed)`; without a transform the fetched
//!   bytes are returned directly and the cache is never consulted.
//! - With a transform: `CacheLookup -> Hit -> Respond`, or
//!   `CacheLookup -> Miss -> Apply -> Encode -> Store -> Respond`.
//! - Rendering runs on the blocking pool. A failed store is logged and counted;
//!   the freshly rendered bytes are still returned.
//! - No per-key coordination: racing misses both render and both store, and the
//!   last write wins.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use imgrelay_cache::{CacheKey, CacheLookup, CacheStore};
use imgrelay_fetch::{FetchError, FetchOutcome, FetchResolver, RemoteRequest};
use imgrelay_telemetry::{CacheOutcome, FetchOutcomeLabel, Metrics, TransformOutcome};
use tracing::{debug, warn};

use crate::codec::{ImageCodec, render};
use crate::error::{PipelineError, PipelineResult};
use crate::raster::RasterCodec;
use crate::variant::Variant;

/// How the cache participated in producing a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// No transform was requested, or caching is disabled.
    Bypass,
    /// Served from a stored variant.
    Hit,
    /// Rendered fresh (and stored when possible).
    Miss,
}

impl CacheStatus {
    /// Lowercase label for headers and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bypass => "bypass",
            Self::Hit => "hit",
            Self::Miss => "miss",
        }
    }
}

/// Bytes ready to be sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Response body.
    pub bytes: Bytes,
    /// Negotiated MIME type.
    pub mime_type: String,
    /// Cache participation.
    pub cache: CacheStatus,
}

/// Runs fetch, cache lookup, render and store for one request at a time.
pub struct Executor<C = RasterCodec> {
    resolver: FetchResolver,
    cache: Option<Arc<dyn CacheStore>>,
    codec: Arc<C>,
    metrics: Metrics,
}

impl<C> std::fmt::Debug for Executor<C> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Executor")
            .field("resolver", &self.resolver)
            .field("cache_enabled", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl Executor<RasterCodec> {
    /// Executor using the `image`-backed codec.
    #[must_use]
    pub fn new(
        resolver: FetchResolver,
        cache: Option<Arc<dyn CacheStore>>,
        metrics: Metrics,
    ) -> Self {
        Self::with_codec(resolver, cache, RasterCodec, metrics)
    }
}

impl<C: ImageCodec> Executor<C> {
    /// Executor using a caller-supplied codec.
    #[must_use]
    pub fn with_codec(
        resolver: FetchResolver,
        cache: Option<Arc<dyn CacheStore>>,
        codec: C,
        metrics: Metrics,
    ) -> Self {
        Self {
            resolver,
            cache,
            codec: Arc::new(codec),
            metrics,
        }
    }

    /// Whether transformed variants are persisted.
    #[must_use]
    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Produce the response body for `request` rendered as `variant`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Fetch`] when the source cannot be fetched,
    /// [`PipelineError::Cache`] when a stored variant cannot be read,
    /// [`PipelineError::TransformApply`] when rendering fails, and
    /// [`PipelineError::Join`] when the render task dies.
    pub async fn execute(
        &self,
        request: &RemoteRequest,
        variant: &Variant,
    ) -> PipelineResult<Rendered> {
        let fetched = self.fetch(request).await?;

        let Some(signature) = variant.signature() else {
            return Ok(Rendered {
                bytes: fetched.bytes,
                mime_type: fetched.mime_type,
                cache: CacheStatus::Bypass,
            });
        };

        let key = match &self.cache {
            Some(cache) => {
                let key = CacheKey::derive(
                    &fetched.bytes,
                    Some(signature.as_str()),
                    &fetched.extension,
                )?;
                if let CacheLookup::Hit(bytes) = cache.get(&key).await? {
                    self.metrics.inc_cache_lookup(CacheOutcome::Hit);
                    debug!(key = %key, "cache hit");
                    return Ok(Rendered {
                        bytes,
                        mime_type: fetched.mime_type,
                        cache: CacheStatus::Hit,
                    });
                }
                self.metrics.inc_cache_lookup(CacheOutcome::Miss);
                debug!(key = %key, "cache miss");
                Some(key)
            }
            None => None,
        };

        let rendered = self.render(&fetched, variant).await?;

        let cache_status = match (&self.cache, key) {
            (Some(cache), Some(key)) => {
                if let Err(err) = cache.put(&key, &rendered).await {
                    self.metrics.inc_cache_write_failure();
                    warn!(key = %key, error = %err, "failed to store rendered variant");
                }
                CacheStatus::Miss
            }
            _ => CacheStatus::Bypass,
        };

        Ok(Rendered {
            bytes: rendered,
            mime_type: fetched.mime_type,
            cache: cache_status,
        })
    }

    async fn fetch(&self, request: &RemoteRequest) -> PipelineResult<FetchOutcome> {
        match self.resolver.fetch(request).await {
            Ok(outcome) => {
                self.metrics.inc_upstream_fetch(FetchOutcomeLabel::Ok);
                Ok(outcome)
            }
            Err(err) => {
                self.metrics.inc_upstream_fetch(fetch_label(&err));
                Err(err.into())
            }
        }
    }

    async fn render(&self, fetched: &FetchOutcome, variant: &Variant) -> PipelineResult<Bytes> {
        let codec = Arc::clone(&self.codec);
        let source = fetched.bytes.clone();
        let variant = variant.clone();
        let extension = fetched.extension.clone();
        let started = Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            render(codec.as_ref(), &source, &variant, &extension)
        })
        .await?;
        match result {
            Ok(bytes) => {
                self.metrics.inc_transform(TransformOutcome::Ok);
                debug!(
                    elapsed_ms = started.elapsed().as_millis(),
                    size = bytes.len(),
                    "rendered variant"
                );
                Ok(Bytes::from(bytes))
            }
            Err(err) => {
                self.metrics.inc_transform(TransformOutcome::Failed);
                Err(err.into())
            }
        }
    }
}

const fn fetch_label(err: &FetchError) -> FetchOutcomeLabel {
    match err {
        FetchError::Timeout { .. } => FetchOutcomeLabel::Timeout,
        FetchError::Transport { .. }
        | FetchError::ClientBuild { .. }
        | FetchError::Interrupted { .. } => FetchOutcomeLabel::Error,
        FetchError::InvalidUrl { .. }
        | FetchError::Scheme { .. }
        | FetchError::Host { .. }
        | FetchError::Whitelist { .. }
        | FetchError::RedirectLoop { .. }
        | FetchError::UpstreamStatus { .. }
        | FetchError::UnsupportedMime { .. } => FetchOutcomeLabel::Rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};
    use std::path::PathBuf;

    use anyhow::Result;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use imgrelay_cache::{CacheError, CacheResult, DiskCache, content_digest};
    use imgrelay_config::{ProxyConfig, Whitelist};
    use tempfile::TempDir;

    fn source_png() -> Result<Vec<u8>> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(64, 32, |x, y| {
            image::Rgba([
                u8::try_from(x * 4).unwrap_or(0),
                u8::try_from(y * 8).unwrap_or(0),
                128,
                255,
            ])
        }));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn resolver(config: &ProxyConfig) -> Result<FetchResolver> {
        Ok(FetchResolver::new(config)?)
    }

    async fn disk_executor(dir: &TempDir) -> Result<Executor> {
        let cache: Arc<dyn CacheStore> = Arc::new(DiskCache::open(dir.path()).await?);
        Ok(Executor::new(
            resolver(&ProxyConfig::default())?,
            Some(cache),
            Metrics::new()?,
        ))
    }

    fn cached_files(dir: &TempDir) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir.path())? {
            files.push(entry?.path());
        }
        Ok(files)
    }

    #[tokio::test]
    async fn untransformed_requests_bypass_the_cache() -> Result<()> {
        let source = source_png()?;
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200).header("content-type", "image/png").body(&source);
        });
        let dir = TempDir::new()?;
        let executor = disk_executor(&dir).await?;

        let rendered = executor
            .execute(&RemoteRequest::new(server.url("/cat.png")), &Variant::Original)
            .await?;

        assert_eq!(rendered.bytes.as_ref(), source.as_slice());
        assert_eq!(rendered.mime_type, "image/png");
        assert_eq!(rendered.cache, CacheStatus::Bypass);
        assert!(cached_files(&dir)?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn repeated_chain_is_served_from_cache() -> Result<()> {
        let source = source_png()?;
        let server = MockServer::start_async().await;
        let mut upstream = server.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200).header("content-type", "image/png").body(&source);
        });
        let dir = TempDir::new()?;
        let executor = disk_executor(&dir).await?;
        let request = RemoteRequest::new(server.url("/cat.png"));
        let variant = Variant::from_chain(Some("re-20x20"), 1000)?;

        let first = executor.execute(&request, &variant).await?;
        assert_eq!(first.cache, CacheStatus::Miss);
        let expected = dir
            .path()
            .join(format!("{}re-20x20.png", content_digest(&source)));
        assert_eq!(std::fs::read(&expected)?, first.bytes.as_ref());
        upstream.assert();
        upstream.delete();

        // The source is still fetched to derive the key; serve it from a fresh mock.
        let upstream = server.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200).header("content-type", "image/png").body(&source);
        });
        let second = executor.execute(&request, &variant).await?;
        upstream.assert();
        assert_eq!(second.cache, CacheStatus::Hit);
        assert_eq!(second.bytes, first.bytes);
        assert_eq!(cached_files(&dir)?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn failed_render_stores_nothing() -> Result<()> {
        let source = source_png()?;
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200).header("content-type", "image/png").body(&source);
        });
        let dir = TempDir::new()?;
        let executor = disk_executor(&dir).await?;

        let result = executor
            .execute(
                &RemoteRequest::new(server.url("/cat.png")),
                &Variant::from_chain(Some("ex-60x0x10x10"), 1000)?,
            )
            .await;

        assert!(matches!(result, Err(PipelineError::TransformApply { .. })));
        assert!(cached_files(&dir)?.is_empty());
        Ok(())
    }

    struct BrokenStore {
        fail_reads: bool,
    }

    fn broken(operation: &'static str) -> CacheError {
        CacheError::Io {
            operation,
            path: PathBuf::from("broken"),
            source: io::Error::other("disk unavailable"),
        }
    }

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &CacheKey) -> CacheResult<CacheLookup> {
            if self.fail_reads {
                Err(broken("cache.get"))
            } else {
                Ok(CacheLookup::Miss)
            }
        }

        async fn put(&self, _key: &CacheKey, _bytes: &[u8]) -> CacheResult<()> {
            Err(broken("cache.put.write"))
        }
    }

    #[tokio::test]
    async fn store_failures_still_serve_the_render() -> Result<()> {
        let source = source_png()?;
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200).header("content-type", "image/png").body(&source);
        });
        let metrics = Metrics::new()?;
        let cache: Arc<dyn CacheStore> = Arc::new(BrokenStore { fail_reads: false });
        let executor = Executor::new(
            resolver(&ProxyConfig::default())?,
            Some(cache),
            metrics.clone(),
        );

        let rendered = executor
            .execute(
                &RemoteRequest::new(server.url("/cat.png")),
                &Variant::from_chain(Some("fx-1"), 1000)?,
            )
            .await?;

        assert_eq!(rendered.cache, CacheStatus::Miss);
        assert_eq!(image::load_from_memory(&rendered.bytes)?.width(), 64);
        assert!(metrics.render()?.contains("cache_write_failures_total 1"));
        Ok(())
    }

    #[tokio::test]
    async fn cache_read_failures_fail_the_request() -> Result<()> {
        let source = source_png()?;
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200).header("content-type", "image/png").body(&source);
        });
        let cache: Arc<dyn CacheStore> = Arc::new(BrokenStore { fail_reads: true });
        let executor = Executor::new(
            resolver(&ProxyConfig::default())?,
            Some(cache),
            Metrics::new()?,
        );

        let result = executor
            .execute(
                &RemoteRequest::new(server.url("/cat.png")),
                &Variant::from_chain(Some("fx-1"), 1000)?,
            )
            .await;

        assert!(matches!(result, Err(PipelineError::Cache { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn disabled_cache_renders_every_time() -> Result<()> {
        let source = source_png()?;
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200).header("content-type", "image/png").body(&source);
        });
        let executor = Executor::new(resolver(&ProxyConfig::default())?, None, Metrics::new()?);
        assert!(!executor.cache_enabled());

        let rendered = executor
            .execute(
                &RemoteRequest::new(server.url("/cat.png")).with_extension("jpg"),
                &Variant::Cover {
                    width: 16,
                    height: 16,
                },
            )
            .await?;

        assert_eq!(rendered.cache, CacheStatus::Bypass);
        assert_eq!(rendered.mime_type, "image/jpeg");
        let decoded = image::load_from_memory(&rendered.bytes)?;
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
        Ok(())
    }

    #[tokio::test]
    async fn fetch_rejections_are_counted() -> Result<()> {
        let metrics = Metrics::new()?;
        let mut config = ProxyConfig::default();
        config.whitelist = Whitelist::parse(["example.com"])?;
        let executor = Executor::new(resolver(&config)?, None, metrics.clone());

        let result = executor
            .execute(
                &RemoteRequest::new("http://evil.com/x.jpg"),
                &Variant::Original,
            )
            .await;

        assert!(matches!(
            result,
            Err(PipelineError::Fetch {
                source: FetchError::Whitelist { .. }
            })
        ));
        assert!(
            metrics
                .render()?
                .contains(r#"upstream_fetches_total{outcome="rejected"} 1"#)
        );
        Ok(())
    }
}
