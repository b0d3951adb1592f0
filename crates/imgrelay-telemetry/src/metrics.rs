//! Prometheus-backed metrics registry.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Label values come from closed enums so cardinality stays bounded.

use std::fmt;
use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::{Result, TelemetryError};

/// Outcome label for `upstream_fetches_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcomeLabel {
    /// Source bytes were fetched.
    Ok,
    /// Scheme, host, whitelist, status or MIME rejection.
    Rejected,
    /// The header timer fired first.
    Timeout,
    /// Transport or protocol failure.
    Error,
}

impl FetchOutcomeLabel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Rejected => "rejected",
            Self::Timeout => "timeout",
            Self::Error => "error",
        }
    }
}

/// Outcome label for `cache_lookups_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Stored variant served.
    Hit,
    /// Variant computed.
    Miss,
}

impl CacheOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
        }
    }
}

/// Outcome label for `transforms_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Chain applied and re-encoded.
    Ok,
    /// Decode, apply or encode failed.
    Failed,
}

impl TransformOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
        }
    }
}

/// Prometheus-backed metrics registry shared across the proxy.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Metrics").finish_non_exhaustive()
    }
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    upstream_fetches_total: IntCounterVec,
    cache_lookups_total: IntCounterVec,
    cache_write_failures_total: IntCounter,
    transforms_total: IntCounterVec,
}

impl Metrics {
    /// Construct a new registry with the proxy collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any collector cannot be built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            "http_requests_total",
            "Total HTTP requests received",
            &["route", "code"],
        )?;
        let upstream_fetches_total = counter_vec(
            "upstream_fetches_total",
            "Upstream image fetches by outcome",
            &["outcome"],
        )?;
        let cache_lookups_total = counter_vec(
            "cache_lookups_total",
            "Variant cache lookups by outcome",
            &["outcome"],
        )?;
        let cache_write_failures_total = IntCounter::with_opts(Opts::new(
            "cache_write_failures_total",
            "Variant cache writes that failed and were skipped",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "cache_write_failures_total",
            source,
        })?;
        let transforms_total = counter_vec(
            "transforms_total",
            "Transform chain applications by outcome",
            &["outcome"],
        )?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(&registry, "upstream_fetches_total", &upstream_fetches_total)?;
        register(&registry, "cache_lookups_total", &cache_lookups_total)?;
        register(
            &registry,
            "cache_write_failures_total",
            &cache_write_failures_total,
        )?;
        register(&registry, "transforms_total", &transforms_total)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                upstream_fetches_total,
                cache_lookups_total,
                cache_write_failures_total,
                transforms_total,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Count one upstream fetch.
    pub fn inc_upstream_fetch(&self, outcome: FetchOutcomeLabel) {
        self.inner
            .upstream_fetches_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Count one cache lookup.
    pub fn inc_cache_lookup(&self, outcome: CacheOutcome) {
        self.inner
            .cache_lookups_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Count one swallowed cache write failure.
    pub fn inc_cache_write_failure(&self) {
        self.inner.cache_write_failures_total.inc();
    }

    /// Count one transform chain application.
    pub fn inc_transform(&self, outcome: TransformOutcome) {
        self.inner
            .transforms_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Render the registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or the encoded buffer
    /// is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
