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

//! HTTP surface of the image proxy.
//!
//! Layout: `http/router.rs` (`ApiServer` and middleware stack), `http/proxy.rs`
//! (query and path routes), `http/health.rs` (health and metrics),
//! `http/errors.rs` (problem responses), `http/telemetry.rs` (request counting),
//! `state.rs` (shared handler state), `error.rs` (server errors).

pub mod error;
mod http;
mod models;
mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
pub use models::ProblemDetails;
