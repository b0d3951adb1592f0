//! RFC 9457 error responses and the pipeline-to-status mapping.

use axum::{
    Json,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use imgrelay_fetch::FetchError;
use imgrelay_pipeline::{CodecError, PipelineError};
use tracing::error;

use crate::http::constants::{
    CONTENT_TYPE_PROBLEM, PROBLEM_BAD_REQUEST, PROBLEM_INTERNAL, PROBLEM_NOT_FOUND,
    PROBLEM_UPSTREAM_TIMEOUT,
};
use crate::models::ProblemDetails;

/// Structured API error rendered as a problem document.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn gateway_timeout(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::GATEWAY_TIMEOUT,
            PROBLEM_UPSTREAM_TIMEOUT,
            "upstream timeout",
        )
        .with_detail(detail)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidChain { source } => Self::bad_request(format!(
                "invalid transform operation `{}`: {}",
                source.token(),
                source.reason()
            )),
            PipelineError::InvalidDimension { field, problem } => {
                Self::not_found(format!("Expected {field} to be {problem}"))
            }
            PipelineError::Fetch { source } => fetch_problem(&source),
            PipelineError::TransformApply { source } => Self::bad_request(codec_detail(&source)),
            PipelineError::Cache { source } => {
                error!(error = %source, "variant cache read failed");
                Self::internal("variant cache is unavailable")
            }
            PipelineError::Join { source } => {
                error!(error = %source, "render task failed");
                Self::internal("render task failed")
            }
        }
    }
}

fn fetch_problem(err: &FetchError) -> ApiError {
    match err {
        FetchError::InvalidUrl { url, .. } => {
            ApiError::bad_request(format!("`{url}` is not a valid url"))
        }
        FetchError::Scheme { scheme, .. } => {
            ApiError::not_found(format!("unsupported url scheme `{scheme}`"))
        }
        FetchError::Host { .. } => ApiError::not_found("source url has no host"),
        FetchError::Whitelist { host } => {
            ApiError::not_found(format!("host `{host}` is not whitelisted"))
        }
        FetchError::RedirectLoop { hops, .. } => {
            ApiError::not_found(format!("gave up after {hops} redirects"))
        }
        FetchError::UpstreamStatus { status, .. } => {
            ApiError::not_found(format!("upstream responded with status {status}"))
        }
        FetchError::UnsupportedMime { mime, allowed } => ApiError::not_found(format!(
            "content type `{mime}` is not one of: {}",
            allowed.join(", ")
        )),
        FetchError::Timeout { after, .. } => ApiError::gateway_timeout(format!(
            "upstream did not respond within {}ms",
            after.as_millis()
        )),
        FetchError::Transport { .. } | FetchError::Interrupted { .. } => {
            ApiError::not_found("upstream could not be reached")
        }
        FetchError::ClientBuild { .. } => ApiError::internal("http client unavailable"),
    }
}

fn codec_detail(err: &CodecError) -> String {
    match err {
        CodecError::Decode { .. } => "source is not a decodable image".to_string(),
        CodecError::Apply { operation, reason } => {
            format!("operation `{operation}` cannot be applied: {reason}")
        }
        CodecError::UnsupportedFormat { extension } => {
            format!("cannot encode images as `{extension}`")
        }
        CodecError::Encode { extension, .. } => format!("failed to encode image as `{extension}`"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        (self.status, [(CONTENT_TYPE, CONTENT_TYPE_PROBLEM)], Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use imgrelay_pipeline::{DimensionProblem, Variant};

    #[test]
    fn pipeline_errors_map_to_statuses() {
        let chain = Variant::from_chain(Some("ex-10x10x50"), 1000).err();
        let cases: Vec<(PipelineError, StatusCode, &str)> = vec![
            (
                FetchError::Whitelist {
                    host: "evil.com".into(),
                }
                .into(),
                StatusCode::NOT_FOUND,
                PROBLEM_NOT_FOUND,
            ),
            (
                FetchError::Timeout {
                    url: "http://a.test/x".into(),
                    after: Duration::from_millis(10),
                }
                .into(),
                StatusCode::GATEWAY_TIMEOUT,
                PROBLEM_UPSTREAM_TIMEOUT,
            ),
            (
                PipelineError::InvalidDimension {
                    field: "height",
                    problem: DimensionProblem::AboveLimit { limit: 1000 },
                },
                StatusCode::NOT_FOUND,
                PROBLEM_NOT_FOUND,
            ),
            (
                CodecError::Apply {
                    operation: "ro-45".into(),
                    reason: "unsupported_angle",
                }
                .into(),
                StatusCode::BAD_REQUEST,
                PROBLEM_BAD_REQUEST,
            ),
        ];
        for (err, status, kind) in cases.into_iter().chain(
            chain
                .into_iter()
                .map(|err| (err, StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST)),
        ) {
            let api = ApiError::from(err);
            assert_eq!(api.status, status);
            assert_eq!(api.kind, kind);
        }
    }

    #[test]
    fn dimension_detail_names_the_field() {
        let api = ApiError::from(PipelineError::InvalidDimension {
            field: "width",
            problem: DimensionProblem::NotAnInteger,
        });
        assert_eq!(
            api.detail.as_deref(),
            Some("Expected width to be an integer")
        );
    }

    #[test]
    fn problem_response_uses_problem_content_type() {
        let response = ApiError::bad_request("missing url").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some(CONTENT_TYPE_PROBLEM)
        );
    }
}
