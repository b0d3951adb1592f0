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

//! Fetch, transform and cache orchestration for a single proxy request.
//!
//! Layout: `executor.rs` (`Executor` state machine), `variant.rs` (what to
//! render), `codec.rs` (codec seam and the chain fold), `raster.rs` (the
//! `image`-backed codec), `error.rs`.

pub mod codec;
pub mod error;
pub mod executor;
pub mod raster;
pub mod variant;

pub use codec::{ImageCodec, render};
pub use error::{CodecError, CodecResult, PipelineError, PipelineResult};
pub use executor::{CacheStatus, Executor, Rendered};
pub use raster::RasterCodec;
pub use variant::{DimensionProblem, Variant};
