//! # Design
//!
//! - Centralize application-level errors for bootstrap and serving.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading or validation failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: imgrelay_config::ConfigError,
    },
    /// Telemetry setup failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: imgrelay_telemetry::TelemetryError,
    },
    /// The variant cache could not be opened.
    #[error("cache operation failed")]
    Cache {
        /// Operation identifier.
        operation: &'static str,
        /// Source cache error.
        source: imgrelay_cache::CacheError,
    },
    /// The fetch resolver could not be built.
    #[error("fetch resolver operation failed")]
    Fetch {
        /// Operation identifier.
        operation: &'static str,
        /// Source fetch error.
        source: imgrelay_fetch::FetchError,
    },
    /// The HTTP server failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: imgrelay_api::ApiServerError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: imgrelay_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: imgrelay_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn cache(operation: &'static str, source: imgrelay_cache::CacheError) -> Self {
        Self::Cache { operation, source }
    }

    pub(crate) const fn fetch(operation: &'static str, source: imgrelay_fetch::FetchError) -> Self {
        Self::Fetch { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: imgrelay_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }
}
