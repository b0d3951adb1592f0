#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, unused)]
#![allow(clippy::module_name_repetitions)]

//! Telemetry primitives shared across the imgrelay workspace.
//!
//! Logging setup, the process-wide application span, request-id layers, and the
//! Prometheus registry live here so the HTTP surface and the pipeline report
//! through one place.

pub mod context;
pub mod error;
pub mod init;
pub mod layers;
pub mod metrics;

pub use context::GlobalContextGuard;
pub use error::{Result, TelemetryError};
pub use init::{
    DEFAULT_LOG_LEVEL, LOG_FORMAT_ENV, LogFormat, LoggingConfig, build_sha, init_logging,
};
pub use layers::{propagate_request_id_layer, set_request_id_layer};
pub use metrics::{CacheOutcome, FetchOutcomeLabel, Metrics, TransformOutcome};
