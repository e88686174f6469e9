//! Client errors.

use smol_str::SmolStr;
use thiserror::Error;

/// Errors surfaced by the variation client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Base url or other setting rejected.
    #[error("invalid config: {0}")]
    InvalidConfig(SmolStr),

    /// The name slugifies to nothing usable.
    #[error("'{0}' is not a usable variation name")]
    InvalidName(SmolStr),

    /// Another variation already uses the slug.
    #[error("a variation with the name {0} already exists")]
    DuplicateVariation(SmolStr),

    /// Connection, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(SmolStr),

    /// The server answered with an error acknowledgement.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message from the acknowledgement.
        message: SmolStr,
    },

    /// The server answered with a body that does not match the request.
    #[error("unexpected response: {0}")]
    Protocol(SmolStr),

    /// Push subscription failed to connect or read.
    #[error("push channel: {0}")]
    Push(SmolStr),
}

impl ClientError {
    /// Whether the error was raised before any request was made.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidName(_) | Self::DuplicateVariation(_))
    }
}
