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

//! Compact transform-chain language for image variants.
//!
//! A chain such as `re-200x200,ro-90,fx-1` is parsed into an immutable
//! [`TransformChain`] of typed [`Operation`]s. Parsing is all-or-nothing and the
//! chain's `Display` form is the normalized signature used for cache keys.
//!
//! Layout: `model.rs` (operation and chain types), `parse.rs` (grammar),
//! `error.rs` (parse errors).

pub mod error;
pub mod model;
pub mod parse;

pub use error::{TransformError, TransformResult};
pub use model::{Operation, OperationCode, TransformChain};
pub use parse::{MAX_CHAIN_LENGTH, parse};
