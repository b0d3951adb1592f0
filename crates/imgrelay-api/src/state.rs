//! Shared handler state.

use axum::http::HeaderValue;
use imgrelay_config::ProxyConfig;
use imgrelay_pipeline::Executor;
use imgrelay_telemetry::Metrics;

pub(crate) struct ApiState {
    pub(crate) executor: Executor,
    pub(crate) telemetry: Metrics,
    pub(crate) cache_control: HeaderValue,
    pub(crate) max_dimension: u32,
}

impl ApiState {
    pub(crate) fn new(executor: Executor, telemetry: Metrics, config: &ProxyConfig) -> Self {
        Self {
            executor,
            telemetry,
            cache_control: cache_control(config.cache_control_ttl),
            max_dimension: config.max_dimension,
        }
    }
}

fn cache_control(ttl: u64) -> HeaderValue {
    HeaderValue::from_str(&format!("max-age={ttl}, public"))
        .unwrap_or_else(|_| HeaderValue::from_static("public"))
}
