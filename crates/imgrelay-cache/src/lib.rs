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

//! Content-addressable variant cache.
//!
//! Layout: `key.rs` (key derivation), `store.rs` (`CacheStore` trait and the
//! disk-backed implementation), `error.rs` (error types).

pub mod error;
pub mod key;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use key::{CacheKey, NO_TRANSFORM_MARKER, content_digest};
pub use store::{CacheLookup, CacheStore, DiskCache};
