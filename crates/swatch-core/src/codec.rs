//! Raw source encodings of variation and metadata files.
//!
//! Both are pretty printed JSON with two space indentation and a trailing
//! newline so that files diff cleanly. Property order is preserved.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::model::{CustomMetadata, Props};

/// Decoded contents of one variation file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariationSource {
    /// Display name; absent in hand-written files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Property values.
    #[serde(default)]
    pub props: Props,
}

impl VariationSource {
    /// Source with a display name.
    pub fn named(name: impl Into<String>, props: Props) -> Self {
        Self {
            name: Some(name.into()),
            props,
        }
    }
}

fn to_pretty<T: Serialize>(value: &T) -> String {
    let mut text = serde_json::to_string_pretty(value).unwrap_or_default();
    text.push('\n');
    text
}

/// Encodes a variation for persistence.
#[must_use]
pub fn encode_variation(source: &VariationSource) -> String {
    to_pretty(source)
}

/// Decodes a persisted variation.
///
/// # Errors
/// Returns a [`DecodeError`] when the text is blank, is not JSON, or is not
/// an object with an object `props` member.
pub fn decode_variation(text: &str) -> Result<VariationSource, DecodeError> {
    if text.trim().is_empty() {
        return Err(DecodeError::new("variation source is empty"));
    }
    serde_json::from_str(text).map_err(|err| DecodeError::from_json(&err))
}

/// Encodes custom metadata for persistence.
#[must_use]
pub fn encode_metadata(metadata: &CustomMetadata) -> String {
    to_pretty(metadata)
}

/// Decodes custom metadata; blank text is empty metadata.
///
/// # Errors
/// Returns a [`DecodeError`] when non-blank text does not decode.
pub fn decode_metadata(text: &str) -> Result<CustomMetadata, DecodeError> {
    if text.trim().is_empty() {
        return Ok(CustomMetadata::default());
    }
    serde_json::from_str(text).map_err(|err| DecodeError::from_json(&err))
}
