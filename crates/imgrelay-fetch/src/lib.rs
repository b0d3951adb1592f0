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

//! Remote image resolution: target validation, redirect chasing, content-type
//! negotiation, and a single-fire header timeout.
//!
//! Layout: `resolver.rs` (`FetchResolver`), `redirect.rs` (location resolution),
//! `settle.rs` (single-assignment outcome cell), `media.rs` (extension/MIME
//! table), `model.rs` (request/outcome types), `error.rs`.

pub mod error;
pub mod media;
pub mod model;
pub mod redirect;
pub mod resolver;
mod settle;

pub use error::{FetchError, FetchResult};
pub use model::{FetchOutcome, RemoteRequest};
pub use resolver::FetchResolver;
