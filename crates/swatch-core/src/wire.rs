//! JSON bodies shared by the HTTP endpoints and the push channel.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::model::PropDeclaration;

/// Kind of change announced on the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PushEventKind {
    /// `meta.json` of the component was written.
    ComponentMetadataChanged,
    /// An existing variation file was rewritten.
    ComponentVariationChanged,
    /// A variation file appeared.
    ComponentVariationAdded,
    /// A variation file was deleted.
    ComponentVariationRemoved,
}

impl PushEventKind {
    /// Name used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ComponentMetadataChanged => "componentMetadataChanged",
            Self::ComponentVariationChanged => "componentVariationChanged",
            Self::ComponentVariationAdded => "componentVariationAdded",
            Self::ComponentVariationRemoved => "componentVariationRemoved",
        }
    }

    /// Whether receivers should refetch metadata rather than variations.
    #[must_use]
    pub const fn is_metadata(self) -> bool {
        matches!(self, Self::ComponentMetadataChanged)
    }
}

/// One push frame: the kind of change and the component it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PushEvent {
    /// What changed.
    pub event: PushEventKind,
    /// Component path relative to the component root.
    pub component: SmolStr,
}

impl PushEvent {
    /// Event about `component`.
    pub fn new(event: PushEventKind, component: impl Into<SmolStr>) -> Self {
        Self {
            event,
            component: component.into(),
        }
    }

    /// Encodes the event as a text frame.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parses a text frame; unknown events and malformed frames yield `None`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// One discoverable component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// Path relative to the component root.
    pub path: SmolStr,
    /// Display name.
    pub name: SmolStr,
}

/// `GET /components`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentList {
    /// Components in path order.
    pub data: Vec<ComponentEntry>,
}

/// `GET /components/{path}`: raw metadata source plus the declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentResponse {
    /// Raw `meta.json` source; empty when there is none.
    pub data: String,
    /// Declarations found by the analyzer.
    #[serde(default)]
    pub props: IndexMap<SmolStr, PropDeclaration>,
    /// Display name of the component.
    #[serde(default)]
    pub name: SmolStr,
    /// Component doc comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `GET /variations/{path}`: raw sources keyed by slug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationsResponse {
    /// Raw variation sources keyed by slug.
    pub data: IndexMap<SmolStr, String>,
}

/// `POST /components/{path}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMetadata {
    /// Full `meta.json` source to write.
    pub code: String,
}

/// `POST /variations/{path}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveVariation {
    /// Slug of the variation to write.
    pub variation: SmolStr,
    /// Full variation source.
    pub code: String,
}

/// Acknowledgement, or error report when `ok` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Whether the request succeeded.
    pub ok: bool,
    /// What went wrong, when it did not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    /// Success.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    /// Failure with `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_frames_use_event_names() {
        let event = PushEvent::new(PushEventKind::ComponentVariationAdded, "buttons/Button.jsx");
        assert_eq!(
            event.to_json(),
            r#"{"event":"componentVariationAdded","component":"buttons/Button.jsx"}"#
        );
        assert_eq!(PushEvent::parse(&event.to_json()), Some(event));
    }

    #[test]
    fn unknown_push_frames_are_ignored() {
        assert_eq!(PushEvent::parse(r#"{"event":"reload","component":"a"}"#), None);
        assert_eq!(PushEvent::parse("not json"), None);
    }

    #[test]
    fn error_acks_carry_a_message() {
        let json = serde_json::to_string(&Ack::error("unknown component")).expect("serialize");
        assert_eq!(json, r#"{"ok":false,"error":"unknown component"}"#);
        assert_eq!(serde_json::to_string(&Ack::ok()).expect("serialize"), r#"{"ok":true}"#);
    }
}
