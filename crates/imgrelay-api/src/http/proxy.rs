//! Proxy routes.
//!
//! # Design
//! - The variant (chain or cover box) is validated before anything is fetched, so
//!   malformed requests fail without upstream traffic.
//! - Dropping the handler future (client gone) drops the executor future, which
//!   aborts the in-flight upstream request.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::Response,
};
use imgrelay_fetch::RemoteRequest;
use imgrelay_pipeline::{Rendered, Variant};
use serde::Deserialize;
use tracing::error;

use crate::http::constants::HEADER_CACHE_STATUS;
use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Query route parameters: `?url=<source>&f=<chain>&e=<extension>`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProxyQuery {
    url: Option<String>,
    f: Option<String>,
    e: Option<String>,
}

pub(crate) async fn proxy_query(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, ApiError> {
    let url = query
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("missing `url` query parameter"))?;
    let variant = Variant::from_chain(query.f.as_deref(), state.max_dimension)?;
    let request = with_extension(RemoteRequest::new(url), query.e.as_deref());
    respond(&state, &request, &variant).await
}

pub(crate) async fn proxy_cover(
    State(state): State<Arc<ApiState>>,
    Path((url, width, height)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let (height, extension) = split_extension(&height);
    let variant = Variant::cover(&width, height, state.max_dimension)?;
    let request = with_extension(RemoteRequest::new(url), extension);
    respond(&state, &request, &variant).await
}

async fn respond(
    state: &ApiState,
    request: &RemoteRequest,
    variant: &Variant,
) -> Result<Response, ApiError> {
    let rendered = state.executor.execute(request, variant).await?;
    image_response(rendered, &state.cache_control)
}

fn image_response(rendered: Rendered, cache_control: &HeaderValue) -> Result<Response, ApiError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, rendered.mime_type)
        .header(CACHE_CONTROL, cache_control.clone())
        .header(HEADER_CACHE_STATUS, rendered.cache.as_str())
        .body(Body::from(rendered.bytes))
        .map_err(|err| {
            error!(error = %err, "failed to build image response");
            ApiError::internal("failed to build image response")
        })
}

fn with_extension(request: RemoteRequest, extension: Option<&str>) -> RemoteRequest {
    match extension.map(str::trim).filter(|extension| !extension.is_empty()) {
        Some(extension) => request.with_extension(extension),
        None => request,
    }
}

/// Split `"200.jpg"` into `("200", Some("jpg"))`.
fn split_extension(segment: &str) -> (&str, Option<&str>) {
    segment
        .split_once('.')
        .map_or((segment, None), |(value, extension)| (value, Some(extension)))
}
