//! `swatch-server` - component library server and push channel.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// `swatch.toml` loading.
pub mod config;
/// Server errors.
pub mod error;
/// HTTP endpoints and websocket upgrade.
pub mod http;
/// Component discovery and declarations.
pub mod library;
/// Push event fan-out.
pub mod push;
/// Variation and metadata files.
pub mod store;
/// Library watcher.
pub mod watch;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ServerConfig;
pub use error::ServerError;
pub use http::SwatchServer;
