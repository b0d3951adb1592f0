//! Router construction and server host for the proxy.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, http::Request, routing::get};
use imgrelay_config::ProxyConfig;
use imgrelay_pipeline::Executor;
use imgrelay_telemetry::{Metrics, build_sha};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{Span, info};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::constants::HEADER_REQUEST_ID;
use crate::http::health::{health, metrics};
use crate::http::proxy::{proxy_cover, proxy_query};
use crate::http::telemetry::HttpMetricsLayer;
use crate::state::ApiState;

/// Axum router wrapper hosting the proxy routes.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router around `executor`, reporting through `telemetry`.
    #[must_use]
    pub fn new(executor: Executor, telemetry: Metrics, config: &ProxyConfig) -> Self {
        let state = Arc::new(ApiState::new(executor, telemetry.clone(), config));
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(imgrelay_telemetry::set_request_id_layer())
            .layer(imgrelay_telemetry::propagate_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry));

        let router = Router::new()
            .route("/", get(proxy_query))
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route("/{url}/{width}/{height}", get(proxy_cover))
            .route_layer(layered)
            .with_state(state);

        Self { router }
    }

    /// Bind `addr` and serve until `shutdown` resolves, then drain in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] if the listener cannot be bound and
    /// [`ApiServerError::Serve`] if serving fails.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        info!(addr = %addr, "image proxy listening");
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })?;
        info!("image proxy stopped");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use anyhow::Result;
    use axum::body::{Body, to_bytes};
    use axum::http::{StatusCode, header};
    use axum::response::Response;
    use httpmock::prelude::*;
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use imgrelay_cache::{CacheStore, DiskCache, content_digest};
    use imgrelay_config::Whitelist;
    use imgrelay_fetch::FetchResolver;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn source_png() -> Result<Vec<u8>> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            60,
            40,
            image::Rgba([10, 200, 30, 255]),
        ));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn encode(value: &str) -> String {
        url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
    }

    struct Harness {
        server: ApiServer,
        cache_dir: TempDir,
    }

    async fn harness(configure: impl FnOnce(&mut ProxyConfig)) -> Result<Harness> {
        let cache_dir = TempDir::new()?;
        let mut config = ProxyConfig {
            cache_folder: cache_dir.path().to_path_buf(),
            ..ProxyConfig::default()
        };
        configure(&mut config);
        let cache: Option<Arc<dyn CacheStore>> = if config.cache_enabled {
            Some(Arc::new(DiskCache::open(&config.cache_folder).await?))
        } else {
            None
        };
        let telemetry = Metrics::new()?;
        let executor = Executor::new(FetchResolver::new(&config)?, cache, telemetry.clone());
        Ok(Harness {
            server: ApiServer::new(executor, telemetry, &config),
            cache_dir,
        })
    }

    async fn get(server: &ApiServer, uri: &str) -> Result<Response> {
        let request = Request::builder().uri(uri).body(Body::empty())?;
        Ok(server.router().clone().oneshot(request).await?)
    }

    async fn problem(response: Response) -> Result<Value> {
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("application/problem+json")
        );
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn header_text<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
        response
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    #[tokio::test]
    async fn health_reports_cache_state() -> Result<()> {
        let harness = harness(|config| config.cache_enabled = false).await?;
        let response = get(&harness.server, "/health").await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await?)?;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["cache"], "disabled");
        assert!(body["build"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn transformed_image_is_cached_and_replayed() -> Result<()> {
        let source = source_png()?;
        let upstream = MockServer::start_async().await;
        let mut mock = upstream.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200).header("content-type", "image/png").body(&source);
        });
        let harness = harness(|_| {}).await?;
        let uri = format!("/?url={}&f=re-20x20", encode(&upstream.url("/cat.png")));

        let first = get(&harness.server, &uri).await?;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(header_text(&first, "content-type"), Some("image/png"));
        assert_eq!(
            header_text(&first, "cache-control"),
            Some("max-age=31536000, public")
        );
        assert_eq!(header_text(&first, "x-imgrelay-cache"), Some("miss"));
        assert!(header_text(&first, "x-request-id").is_some());
        let first_body = to_bytes(first.into_body(), usize::MAX).await?;
        let decoded = image::load_from_memory(&first_body)?;
        assert_eq!((decoded.width(), decoded.height()), (20, 20));
        let key = format!("{}re-20x20.png", content_digest(&source));
        assert!(harness.cache_dir.path().join(key).is_file());
        mock.assert();
        mock.delete();

        upstream.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200).header("content-type", "image/png").body(&source);
        });
        let second = get(&harness.server, &uri).await?;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(header_text(&second, "x-imgrelay-cache"), Some("hit"));
        let second_body = to_bytes(second.into_body(), usize::MAX).await?;
        assert_eq!(first_body, second_body);
        Ok(())
    }

    #[tokio::test]
    async fn untransformed_image_passes_through() -> Result<()> {
        let source = source_png()?;
        let upstream = MockServer::start_async().await;
        upstream.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200).header("content-type", "image/png").body(&source);
        });
        let harness = harness(|_| {}).await?;

        let response = get(
            &harness.server,
            &format!("/?url={}", encode(&upstream.url("/cat.png"))),
        )
        .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_text(&response, "x-imgrelay-cache"), Some("bypass"));
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(body.as_ref(), source.as_slice());
        Ok(())
    }

    #[tokio::test]
    async fn missing_url_is_a_bad_request() -> Result<()> {
        let harness = harness(|_| {}).await?;
        let response = get(&harness.server, "/?f=re-10").await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = problem(response).await?;
        assert_eq!(body["status"], 400);
        assert_eq!(body["type"], "https://imgrelay.dev/problems/bad-request");
        Ok(())
    }

    #[tokio::test]
    async fn malformed_chain_fails_before_fetching() -> Result<()> {
        let upstream = MockServer::start_async().await;
        let mock = upstream.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200).header("content-type", "image/png").body("x");
        });
        let harness = harness(|_| {}).await?;

        let response = get(
            &harness.server,
            &format!(
                "/?url={}&f=ex-10x10x50",
                encode(&upstream.url("/cat.png"))
            ),
        )
        .await?;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = problem(response).await?;
        assert!(
            body["detail"]
                .as_str()
                .is_some_and(|detail| detail.contains("ex-10x10x50"))
        );
        mock.assert_calls(0);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_resize_fails_before_fetching() -> Result<()> {
        let upstream = MockServer::start_async().await;
        let mock = upstream.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200).header("content-type", "image/png").body("x");
        });
        let harness = harness(|_| {}).await?;

        let response = get(
            &harness.server,
            &format!(
                "/?url={}&f=re-100000x100000",
                encode(&upstream.url("/cat.png"))
            ),
        )
        .await?;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            problem(response).await?["detail"],
            "Expected width to be less than or equal to 1000"
        );
        mock.assert_calls(0);
        Ok(())
    }

    #[tokio::test]
    async fn overlong_chain_is_a_bad_request() -> Result<()> {
        let upstream = MockServer::start_async().await;
        let mock = upstream.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200).header("content-type", "image/png").body("x");
        });
        let harness = harness(|_| {}).await?;
        let chain = ["fx-1"; 50].join(",");

        let response = get(
            &harness.server,
            &format!(
                "/?url={}&f={}",
                encode(&upstream.url("/cat.png")),
                encode(&chain)
            ),
        )
        .await?;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = problem(response).await?;
        assert!(
            body["detail"]
                .as_str()
                .is_some_and(|detail| detail.ends_with("chain_too_long"))
        );
        mock.assert_calls(0);
        Ok(())
    }

    #[tokio::test]
    async fn non_whitelisted_host_is_not_found() -> Result<()> {
        let whitelist = Whitelist::parse(["example.com"])?;
        let harness = harness(|config| config.whitelist = whitelist).await?;

        let response = get(
            &harness.server,
            &format!("/?url={}", encode("http://evil.com/x.jpg")),
        )
        .await?;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = problem(response).await?;
        assert_eq!(body["detail"], "host `evil.com` is not whitelisted");
        Ok(())
    }

    #[tokio::test]
    async fn slow_upstream_is_a_gateway_timeout() -> Result<()> {
        let upstream = MockServer::start_async().await;
        upstream.mock(|when, then| {
            when.method(GET).path("/slow.png");
            then.status(200)
                .header("content-type", "image/png")
                .body("late")
                .delay(Duration::from_millis(500));
        });
        let harness = harness(|config| config.request_timeout = Duration::from_millis(50)).await?;

        let response = get(
            &harness.server,
            &format!("/?url={}&f=fx-1", encode(&upstream.url("/slow.png"))),
        )
        .await?;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(problem(response).await?["status"], 504);
        Ok(())
    }

    #[tokio::test]
    async fn upstream_errors_are_not_found() -> Result<()> {
        let upstream = MockServer::start_async().await;
        upstream.mock(|when, then| {
            when.method(GET).path("/gone.png");
            then.status(500);
        });
        let harness = harness(|_| {}).await?;

        let response = get(
            &harness.server,
            &format!("/?url={}", encode(&upstream.url("/gone.png"))),
        )
        .await?;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn cover_route_crops_and_honours_extension() -> Result<()> {
        let source = source_png()?;
        let upstream = MockServer::start_async().await;
        upstream.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200).header("content-type", "image/png").body(&source);
        });
        let harness = harness(|_| {}).await?;

        let response = get(
            &harness.server,
            &format!("/{}/16/16.jpg", encode(&upstream.url("/cat.png"))),
        )
        .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_text(&response, "content-type"), Some("image/jpeg"));
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let decoded = image::load_from_memory(&body)?;
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
        let key = format!("{}cover-16x16.jpg", content_digest(&source));
        assert!(harness.cache_dir.path().join(key).is_file());
        Ok(())
    }

    #[tokio::test]
    async fn cover_route_rejects_bad_dimensions() -> Result<()> {
        let harness = harness(|config| config.max_dimension = 100).await?;
        let source = encode("http://a.test/cat.png");

        let response = get(&harness.server, &format!("/{source}/abc/10")).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            problem(response).await?["detail"],
            "Expected width to be an integer"
        );

        let response = get(&harness.server, &format!("/{source}/10/101.png")).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            problem(response).await?["detail"],
            "Expected height to be less than or equal to 100"
        );
        Ok(())
    }

    #[tokio::test]
    async fn metrics_count_requests_by_route() -> Result<()> {
        let harness = harness(|_| {}).await?;
        let _ = get(&harness.server, "/?f=re-10").await?;

        let response = get(&harness.server, "/metrics").await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let text = String::from_utf8(body.to_vec())?;
        assert!(text.contains(r#"http_requests_total{code="400",route="/"} 1"#));
        Ok(())
    }
}
