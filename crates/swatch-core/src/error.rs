//! Decode errors for persisted sources.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// A persisted source that could not be decoded.
///
/// Positions are 1-based; `0` means the position is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} (line {line}, column {column})")]
pub struct DecodeError {
    /// Human readable reason.
    pub message: SmolStr,
    /// Line of the failure.
    pub line: usize,
    /// Column of the failure.
    pub column: usize,
}

impl DecodeError {
    /// Error without a source position.
    pub fn new(message: impl Into<SmolStr>) -> Self {
        Self {
            message: message.into(),
            line: 0,
            column: 0,
        }
    }

    pub(crate) fn from_json(err: &serde_json::Error) -> Self {
        let text = err.to_string();
        let message = text
            .split(" at line ")
            .next()
            .unwrap_or(text.as_str())
            .to_string();
        Self {
            message: message.into(),
            line: err.line(),
            column: err.column(),
        }
    }
}
