//! Resolution of declarations plus custom overrides into control descriptors.
//!
//! Only declared properties receive a control. An override naming a control
//! type replaces the inferred kind; its `constraints` refine the array element
//! and its `fields` refine object fields, recursively and to any depth. When an
//! override carries no nested constraint the declaration's own nested type is
//! kept.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::model::{ControlDescriptor, ControlKind, CustomMetadata, CustomOverride, PropDeclaration};

/// Resolves every declared property against the matching override, if any.
#[must_use]
pub fn resolve(
    declarations: &IndexMap<SmolStr, PropDeclaration>,
    overrides: &IndexMap<SmolStr, CustomOverride>,
) -> IndexMap<SmolStr, ControlDescriptor> {
    declarations
        .iter()
        .map(|(name, declaration)| {
            let inferred = ControlDescriptor::from_declaration(declaration);
            let resolved = resolve_descriptor(&inferred, overrides.get(name));
            (name.clone(), resolved)
        })
        .collect()
}

/// [`resolve`] over a component's custom metadata, tolerating its absence.
#[must_use]
pub fn resolve_with_metadata(
    declarations: &IndexMap<SmolStr, PropDeclaration>,
    metadata: Option<&CustomMetadata>,
) -> IndexMap<SmolStr, ControlDescriptor> {
    match metadata {
        Some(metadata) => resolve(declarations, &metadata.props),
        None => resolve(declarations, &IndexMap::new()),
    }
}

/// Applies one override to an already inferred or resolved descriptor.
///
/// `resolve_descriptor(d, None) == d` and
/// `resolve_descriptor(d, Some(&d.to_override())) == d` hold for every `d`.
#[must_use]
pub fn resolve_descriptor(
    base: &ControlDescriptor,
    custom: Option<&CustomOverride>,
) -> ControlDescriptor {
    let Some(custom) = custom else {
        return base.clone();
    };

    let mut resolved = base.clone();
    if let Some(control_type) = custom.control_type.as_ref() {
        if *control_type != base.control_type() {
            resolved.kind = ControlKind::parse(control_type);
            resolved.custom = match resolved.kind {
                ControlKind::Unknown if control_type.as_str() != "unknown" => {
                    Some(control_type.clone())
                }
                _ => None,
            };
        }
    }

    resolved.element = match resolved.kind {
        ControlKind::ArrayOf => Some(Box::new(resolve_element(base, custom))),
        _ => None,
    };
    resolved.fields = match resolved.kind {
        ControlKind::ObjectOf => resolve_fields(base, custom),
        _ => IndexMap::new(),
    };
    resolved
}

fn resolve_element(base: &ControlDescriptor, custom: &CustomOverride) -> ControlDescriptor {
    let constraints = custom.constraints.as_deref();
    match base.element.as_deref() {
        Some(element) if base.kind == ControlKind::ArrayOf => {
            resolve_descriptor(element, constraints)
        }
        _ => resolve_descriptor(&ControlDescriptor::unknown(true), constraints),
    }
}

fn resolve_fields(
    base: &ControlDescriptor,
    custom: &CustomOverride,
) -> IndexMap<SmolStr, ControlDescriptor> {
    if base.kind == ControlKind::ObjectOf {
        return base
            .fields
            .iter()
            .map(|(name, field)| (name.clone(), resolve_descriptor(field, custom.fields.get(name))))
            .collect();
    }
    // Without a declared shape the override defines the fields.
    custom
        .fields
        .iter()
        .map(|(name, field)| {
            (
                name.clone(),
                resolve_descriptor(&ControlDescriptor::unknown(false), Some(field)),
            )
        })
        .collect()
}
