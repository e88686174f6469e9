//! Server errors.

use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised while serving the library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    /// Configuration could not be read or is invalid.
    #[error("invalid config: {0}")]
    InvalidConfig(SmolStr),

    /// Malformed component path, slug or request body.
    #[error("invalid input: {0}")]
    InvalidInput(SmolStr),

    /// No endpoint matches the request.
    #[error("no route for {0}")]
    NoRoute(SmolStr),

    /// The path does not name a discovered component.
    #[error("unknown component '{0}'")]
    UnknownComponent(SmolStr),

    /// The component has no variation with this slug.
    #[error("unknown variation '{slug}' of '{component}'")]
    UnknownVariation {
        /// Component path.
        component: SmolStr,
        /// Requested slug.
        slug: SmolStr,
    },

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(SmolStr),

    /// Anything else that went wrong while serving.
    #[error("server error: {0}")]
    Server(SmolStr),
}

impl ServerError {
    /// Shorthand for [`ServerError::InvalidInput`].
    pub fn invalid(message: impl Into<SmolStr>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub(crate) fn io(context: impl std::fmt::Display, err: &std::io::Error) -> Self {
        Self::Io(format!("{context}: {err}").into())
    }

    /// HTTP status reported for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::NoRoute(_) | Self::UnknownComponent(_) | Self::UnknownVariation { .. } => 404,
            Self::InvalidConfig(_) | Self::Io(_) | Self::Server(_) => 500,
        }
    }
}
