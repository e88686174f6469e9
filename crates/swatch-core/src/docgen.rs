//! Import of react-docgen JSON into component declarations.
//!
//! The analyzer itself is external; its output lives next to each component
//! source as `<stem>.docgen.json`.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use smol_str::SmolStr;

use crate::error::DecodeError;
use crate::model::{ComponentMetadata, PropDeclaration, PropType, ScalarKind};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawComponent {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    props: IndexMap<SmolStr, RawProp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProp {
    #[serde(default, rename = "type")]
    prop_type: Option<RawType>,
    #[serde(default)]
    ts_type: Option<RawType>,
    #[serde(default)]
    flow_type: Option<RawType>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    default_value: Option<RawDefault>,
}

#[derive(Debug, Deserialize)]
struct RawType {
    name: String,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    elements: Vec<RawType>,
}

#[derive(Debug, Deserialize)]
struct RawDefault {
    value: Value,
    #[serde(default)]
    computed: bool,
}

/// Builds component metadata from docgen output.
///
/// `path` is the component path relative to the library root; its file stem
/// names the component when the output has no `displayName`.
///
/// # Errors
/// Returns a [`DecodeError`] when `source` is not docgen JSON.
pub fn parse_docgen(path: &str, source: &str) -> Result<ComponentMetadata, DecodeError> {
    let raw: RawComponent =
        serde_json::from_str(source).map_err(|err| DecodeError::from_json(&err))?;
    let name = raw
        .display_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| file_stem(path).to_string());
    let props = raw
        .props
        .into_iter()
        .map(|(name, prop)| (name, declaration(prop)))
        .collect();
    Ok(ComponentMetadata {
        path: SmolStr::new(path),
        name: SmolStr::new(name),
        description: raw.description.filter(|text| !text.trim().is_empty()),
        props,
    })
}

fn file_stem(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.split('.').next().unwrap_or(file)
}

fn declaration(prop: RawProp) -> PropDeclaration {
    let ty = match (&prop.prop_type, &prop.ts_type, &prop.flow_type) {
        (Some(ty), _, _) => prop_type(ty),
        (None, Some(ty), _) | (None, None, Some(ty)) => static_type(ty),
        (None, None, None) => PropType::Custom("any".into()),
    };
    let default_value = prop
        .default_value
        .filter(|default| !default.computed)
        .and_then(|default| match default.value {
            Value::String(text) => parse_literal(&text),
            other => Some(other),
        });
    PropDeclaration {
        ty,
        required: prop.required,
        description: prop.description.filter(|text| !text.trim().is_empty()),
        default_value,
    }
}

/// Maps a runtime prop-types entry.
fn prop_type(raw: &RawType) -> PropType {
    match raw.name.as_str() {
        "string" => PropType::Scalar(ScalarKind::String),
        "number" => PropType::Scalar(ScalarKind::Number),
        "bool" => PropType::Scalar(ScalarKind::Bool),
        "enum" => PropType::Enum(enum_options(raw.value.as_ref())),
        "arrayOf" => PropType::ArrayOf(Box::new(nested(raw.value.as_ref()))),
        "array" => PropType::ArrayOf(Box::new(PropType::Custom("any".into()))),
        "shape" | "exact" => PropType::ObjectOf(shape_fields(raw.value.as_ref())),
        "object" | "objectOf" => PropType::ObjectOf(IndexMap::new()),
        "func" => PropType::Function,
        "node" | "element" | "elementType" => PropType::Node,
        other => PropType::Custom(SmolStr::new(other)),
    }
}

/// Maps a TypeScript or Flow annotation.
fn static_type(raw: &RawType) -> PropType {
    match raw.name.as_str() {
        "string" => PropType::Scalar(ScalarKind::String),
        "number" => PropType::Scalar(ScalarKind::Number),
        "boolean" => PropType::Scalar(ScalarKind::Bool),
        "Array" => PropType::ArrayOf(Box::new(
            raw.elements
                .first()
                .map_or_else(|| PropType::Custom("any".into()), static_type),
        )),
        "union" if !raw.elements.is_empty() && raw.elements.iter().all(|e| e.name == "literal") => {
            PropType::Enum(
                raw.elements
                    .iter()
                    .filter_map(|element| element.value.as_ref())
                    .filter_map(|value| value.as_str().and_then(parse_literal))
                    .collect(),
            )
        }
        "signature" if raw_type_is(raw, "function") => PropType::Function,
        "signature" if raw_type_is(raw, "object") => PropType::ObjectOf(IndexMap::new()),
        "ReactNode" | "ReactElement" | "JSX.Element" => PropType::Node,
        other => PropType::Custom(SmolStr::new(other)),
    }
}

fn raw_type_is(raw: &RawType, kind: &str) -> bool {
    raw.value
        .as_ref()
        .and_then(|value| value.get("type"))
        .and_then(Value::as_str)
        .is_some_and(|value| value == kind)
}

fn nested(value: Option<&Value>) -> PropType {
    value
        .and_then(|value| serde_json::from_value::<RawType>(value.clone()).ok())
        .map_or_else(|| PropType::Custom("any".into()), |raw| prop_type(&raw))
}

fn enum_options(value: Option<&Value>) -> Vec<Value> {
    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };
    entries
        .iter()
        .filter(|entry| !entry.get("computed").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|entry| entry.get("value").and_then(Value::as_str))
        .filter_map(parse_literal)
        .collect()
}

fn shape_fields(value: Option<&Value>) -> IndexMap<SmolStr, PropDeclaration> {
    let Some(Value::Object(fields)) = value else {
        return IndexMap::new();
    };
    fields
        .iter()
        .filter_map(|(name, field)| {
            let raw: RawType = serde_json::from_value(field.clone()).ok()?;
            let mut declaration = PropDeclaration::new(
                prop_type(&raw),
                field.get("required").and_then(Value::as_bool).unwrap_or(false),
            );
            declaration.description = field
                .get("description")
                .and_then(Value::as_str)
                .filter(|text| !text.trim().is_empty())
                .map(str::to_string);
            Some((SmolStr::new(name), declaration))
        })
        .collect()
}

/// Parses a source literal as written in docgen output.
fn parse_literal(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.len() >= 2 {
        let quoted = (text.starts_with('\'') && text.ends_with('\''))
            || (text.starts_with('`') && text.ends_with('`'));
        if quoted {
            return Some(Value::String(text[1..text.len() - 1].to_string()));
        }
    }
    if text == "undefined" {
        return None;
    }
    serde_json::from_str(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BUTTON: &str = r#"{
      "description": "A clickable button.",
      "displayName": "Button",
      "props": {
        "label": {
          "type": { "name": "string" },
          "required": true,
          "description": "Text on the button",
          "defaultValue": { "value": "'Click'", "computed": false }
        },
        "size": {
          "type": { "name": "enum", "value": [
            { "value": "'small'", "computed": false },
            { "value": "'large'", "computed": false },
            { "value": "SIZES.huge", "computed": true }
          ] },
          "required": false,
          "description": ""
        },
        "widths": {
          "type": { "name": "arrayOf", "value": { "name": "number" } },
          "required": false,
          "description": ""
        },
        "style": {
          "type": { "name": "shape", "value": {
            "color": { "name": "string", "required": true },
            "padding": { "name": "number" }
          } },
          "required": false,
          "description": "",
          "defaultValue": { "value": "defaultStyle()", "computed": true }
        },
        "onClick": { "type": { "name": "func" }, "required": false, "description": "" },
        "children": { "type": { "name": "node" }, "required": false, "description": "" },
        "variant": { "type": { "name": "union", "value": [] }, "required": false, "description": "" }
      }
    }"#;

    #[test]
    fn prop_types_map_onto_declarations() {
        let meta = parse_docgen("buttons/Button.jsx", BUTTON).expect("docgen");
        assert_eq!(meta.name, "Button");
        assert_eq!(meta.path, "buttons/Button.jsx");
        assert_eq!(meta.description.as_deref(), Some("A clickable button."));

        let label = &meta.props["label"];
        assert_eq!(label.ty, PropType::Scalar(ScalarKind::String));
        assert!(label.required);
        assert_eq!(label.default_value, Some(json!("Click")));

        assert_eq!(
            meta.props["size"].ty,
            PropType::Enum(vec![json!("small"), json!("large")])
        );
        assert_eq!(meta.props["size"].description, None);
        assert_eq!(
            meta.props["widths"].ty,
            PropType::ArrayOf(Box::new(PropType::Scalar(ScalarKind::Number)))
        );
        let PropType::ObjectOf(fields) = &meta.props["style"].ty else {
            panic!("style should be a shape");
        };
        assert!(fields["color"].required);
        assert_eq!(fields["padding"].ty, PropType::Scalar(ScalarKind::Number));
        assert_eq!(meta.props["style"].default_value, None);
        assert_eq!(meta.props["onClick"].ty, PropType::Function);
        assert_eq!(meta.props["children"].ty, PropType::Node);
        assert_eq!(meta.props["variant"].ty, PropType::Custom("union".into()));
    }

    #[test]
    fn typescript_annotations_are_understood() {
        let source = r#"{
          "props": {
            "tone": {
              "tsType": { "name": "union", "raw": "'a' | 'b'", "elements": [
                { "name": "literal", "value": "'a'" },
                { "name": "literal", "value": "'b'" }
              ] },
              "required": true
            },
            "ids": { "tsType": { "name": "Array", "elements": [{ "name": "number" }] }, "required": false },
            "open": { "tsType": { "name": "boolean" }, "required": false }
          }
        }"#;
        let meta = parse_docgen("Tone.tsx", source).expect("docgen");
        assert_eq!(meta.name, "Tone");
        assert_eq!(meta.props["tone"].ty, PropType::Enum(vec![json!("a"), json!("b")]));
        assert_eq!(
            meta.props["ids"].ty,
            PropType::ArrayOf(Box::new(PropType::Scalar(ScalarKind::Number)))
        );
        assert_eq!(meta.props["open"].ty, PropType::Scalar(ScalarKind::Bool));
    }

    #[test]
    fn literals_parse_like_source_code() {
        assert_eq!(parse_literal("'x'"), Some(json!("x")));
        assert_eq!(parse_literal("\"x\""), Some(json!("x")));
        assert_eq!(parse_literal("42"), Some(json!(42)));
        assert_eq!(parse_literal("true"), Some(json!(true)));
        assert_eq!(parse_literal("undefined"), None);
        assert_eq!(parse_literal("someCall()"), None);
    }

    #[test]
    fn invalid_docgen_is_a_decode_error() {
        let err = parse_docgen("Broken.jsx", "{ nope").unwrap_err();
        assert_eq!(err.line, 1);
    }
}
