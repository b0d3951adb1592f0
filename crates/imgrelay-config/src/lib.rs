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

//! Explicit configuration for the image proxy.
//!
//! Layout: `model.rs` (typed config and whitelist), `defaults.rs` (built-in
//! values), `loader.rs` (defaults, JSON file, environment layering),
//! `validate.rs` (field parsing helpers).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_PATH_ENV, ConfigFile, load_from_env, load_with};
pub use model::{ProxyConfig, Whitelist, WhitelistEntry};
