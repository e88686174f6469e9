//! Component declarations, resolved control descriptors and variations.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use smol_str::SmolStr;

use crate::error::DecodeError;

/// Property values of one variation, keyed by property name.
pub type Props = serde_json::Map<String, Value>;

/// Primitive value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalarKind {
    /// Text.
    String,
    /// Any JSON number.
    Number,
    /// `true` or `false`.
    Bool,
}

/// Statically declared type of a component property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of", rename_all = "camelCase")]
pub enum PropType {
    /// One of the primitive kinds.
    Scalar(ScalarKind),
    /// One of a fixed list of literal values.
    Enum(Vec<Value>),
    /// Homogeneous list.
    ArrayOf(Box<PropType>),
    /// Object with named fields.
    ObjectOf(IndexMap<SmolStr, PropDeclaration>),
    /// Callback; never generated.
    Function,
    /// Renderable child; never generated.
    Node,
    /// Anything the analyzer could only name.
    Custom(SmolStr),
}

/// One declared property of a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropDeclaration {
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: PropType,
    /// Whether the component requires the property.
    #[serde(default)]
    pub required: bool,
    /// Doc comment of the property, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default the component falls back to, as written in source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl PropDeclaration {
    /// Declaration without description or default.
    #[must_use]
    pub fn new(ty: PropType, required: bool) -> Self {
        Self {
            ty,
            required,
            description: None,
            default_value: None,
        }
    }
}

/// Everything the analyzer knows about one component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    /// Path relative to the component root.
    pub path: SmolStr,
    /// Display name; the file stem when the analyzer gives none.
    pub name: SmolStr,
    /// Component doc comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared properties in source order.
    #[serde(default)]
    pub props: IndexMap<SmolStr, PropDeclaration>,
}

/// Tag of the control that edits a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Text, number or boolean input.
    Scalar(ScalarKind),
    /// Select among `options`.
    Enum,
    /// List of `element` values.
    ArrayOf,
    /// Object with `fields`.
    ObjectOf,
    /// Read-only placeholder.
    Function,
    /// Read-only placeholder.
    Node,
    /// No control is registered for this type.
    Unknown,
}

impl ControlKind {
    /// Maps a control type name as written in custom metadata.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "string" | "text" => Self::Scalar(ScalarKind::String),
            "number" => Self::Scalar(ScalarKind::Number),
            "bool" | "boolean" => Self::Scalar(ScalarKind::Bool),
            "enum" | "oneOf" => Self::Enum,
            "arrayOf" | "array" => Self::ArrayOf,
            "shape" | "objectOf" | "object" | "exact" => Self::ObjectOf,
            "func" | "function" => Self::Function,
            "node" | "element" => Self::Node,
            _ => Self::Unknown,
        }
    }

    /// Canonical name, as written back into custom metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scalar(ScalarKind::String) => "string",
            Self::Scalar(ScalarKind::Number) => "number",
            Self::Scalar(ScalarKind::Bool) => "bool",
            Self::Enum => "enum",
            Self::ArrayOf => "arrayOf",
            Self::ObjectOf => "shape",
            Self::Function => "func",
            Self::Node => "node",
            Self::Unknown => "unknown",
        }
    }

    /// Kind names offered by the custom metadata form.
    pub const SELECTABLE: [Self; 8] = [
        Self::Scalar(ScalarKind::String),
        Self::Scalar(ScalarKind::Number),
        Self::Scalar(ScalarKind::Bool),
        Self::Enum,
        Self::ArrayOf,
        Self::ObjectOf,
        Self::Function,
        Self::Node,
    ];
}

impl Serialize for ControlKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ControlKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = SmolStr::deserialize(deserializer)?;
        Ok(Self::parse(&name))
    }
}

/// Resolved editing schema for one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    /// Control that edits the property.
    pub kind: ControlKind,
    /// Absent values are not allowed.
    #[serde(default)]
    pub required: bool,
    /// Shown as a hint next to the control.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Choices of an enum control.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Value>,
    /// Element schema of an array control.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<Box<ControlDescriptor>>,
    /// Field schemas of an object control.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<SmolStr, ControlDescriptor>,
    /// Control type name when `kind` is [`ControlKind::Unknown`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<SmolStr>,
}

impl ControlDescriptor {
    /// Descriptor with no options, element or fields.
    #[must_use]
    pub fn new(kind: ControlKind, required: bool) -> Self {
        Self {
            kind,
            required,
            description: None,
            options: Vec::new(),
            element: None,
            fields: IndexMap::new(),
            custom: None,
        }
    }

    /// Descriptor for a type no control handles.
    #[must_use]
    pub fn unknown(required: bool) -> Self {
        Self::new(ControlKind::Unknown, required)
    }

    /// Array of `element`.
    #[must_use]
    pub fn array_of(element: ControlDescriptor, required: bool) -> Self {
        Self {
            element: Some(Box::new(element)),
            ..Self::new(ControlKind::ArrayOf, required)
        }
    }

    /// Object with `fields`.
    #[must_use]
    pub fn object_of(fields: IndexMap<SmolStr, ControlDescriptor>, required: bool) -> Self {
        Self {
            fields,
            ..Self::new(ControlKind::ObjectOf, required)
        }
    }

    /// Descriptor inferred from a declaration alone.
    #[must_use]
    pub fn from_declaration(declaration: &PropDeclaration) -> Self {
        let mut descriptor = Self::from_type(&declaration.ty, declaration.required);
        descriptor.description.clone_from(&declaration.description);
        descriptor
    }

    fn from_type(ty: &PropType, required: bool) -> Self {
        match ty {
            PropType::Scalar(scalar) => Self::new(ControlKind::Scalar(*scalar), required),
            PropType::Enum(options) => Self {
                options: options.clone(),
                ..Self::new(ControlKind::Enum, required)
            },
            // Array elements are always concrete values.
            PropType::ArrayOf(element) => Self::array_of(Self::from_type(element, true), required),
            PropType::ObjectOf(fields) => Self::object_of(
                fields
                    .iter()
                    .map(|(name, field)| (name.clone(), Self::from_declaration(field)))
                    .collect(),
                required,
            ),
            PropType::Function => Self::new(ControlKind::Function, required),
            PropType::Node => Self::new(ControlKind::Node, required),
            PropType::Custom(name) => Self {
                custom: Some(name.clone()),
                ..Self::unknown(required)
            },
        }
    }

    /// Name written into custom metadata for this descriptor's kind.
    #[must_use]
    pub fn control_type(&self) -> SmolStr {
        match (self.kind, self.custom.as_ref()) {
            (ControlKind::Unknown, Some(custom)) => custom.clone(),
            (kind, _) => SmolStr::new(kind.as_str()),
        }
    }

    /// Expresses this descriptor as an override that reproduces it.
    #[must_use]
    pub fn to_override(&self) -> CustomOverride {
        CustomOverride {
            control_type: Some(self.control_type()),
            constraints: self
                .element
                .as_ref()
                .map(|element| Box::new(element.to_override())),
            fields: self
                .fields
                .iter()
                .map(|(name, field)| (name.clone(), field.to_override()))
                .collect(),
        }
    }
}

/// Author annotation refining the inferred control of a property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomOverride {
    /// Control type name; `None` keeps the inferred kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_type: Option<SmolStr>,
    /// Nested constraint for array elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Box<CustomOverride>>,
    /// Nested overrides for object fields.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<SmolStr, CustomOverride>,
}

impl CustomOverride {
    /// Override that only names a control type.
    #[must_use]
    pub fn control(control_type: &str) -> Self {
        Self {
            control_type: Some(SmolStr::new(control_type)),
            ..Self::default()
        }
    }

    /// Sets the element constraint.
    #[must_use]
    pub fn with_constraints(mut self, constraints: CustomOverride) -> Self {
        self.constraints = Some(Box::new(constraints));
        self
    }

    /// Adds an override for object field `name`.
    #[must_use]
    pub fn with_field(mut self, name: &str, field: CustomOverride) -> Self {
        self.fields.insert(SmolStr::new(name), field);
        self
    }
}

/// Contents of a component's `meta.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMetadata {
    /// Overrides keyed by property name.
    #[serde(default)]
    pub props: IndexMap<SmolStr, CustomOverride>,
}

impl CustomMetadata {
    /// Whether nothing is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

/// A persisted variation as seen by a client.
#[derive(Debug, Clone, PartialEq)]
pub struct Variation {
    /// File stem of the variation.
    pub slug: SmolStr,
    /// Human-readable name stored in the file, if any.
    pub name: Option<String>,
    /// Decoded props, or why the source did not decode.
    pub content: Result<Props, DecodeError>,
}

impl Variation {
    /// Title shown in navigation and on the preview card.
    #[must_use]
    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or(self.slug.as_str())
    }

    /// Props when the variation decoded.
    #[must_use]
    pub fn props(&self) -> Option<&Props> {
        self.content.as_ref().ok()
    }

    /// Decode error when it did not.
    #[must_use]
    pub fn error(&self) -> Option<&DecodeError> {
        self.content.as_ref().err()
    }
}
