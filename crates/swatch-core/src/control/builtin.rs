//! Built-in controls.

use rand::seq::IndexedRandom;
use rand::Rng;
use serde_json::Value;

use super::{Control, ControlRegistry, Edit, RandomCx, MAX_RANDOM_ARRAY_LEN};
use crate::form::Widget;
use crate::model::{ControlDescriptor, Props};

const WORDS: [&str; 16] = [
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "labore", "magna", "aliqua",
];

fn random_words(cx: &mut RandomCx<'_>, min: usize, max: usize) -> String {
    let count = cx.rng.random_range(min..=max);
    let mut words = Vec::with_capacity(count);
    for _ in 0..count {
        if let Some(word) = WORDS.choose(&mut *cx.rng) {
            words.push(*word);
        }
    }
    words.join(" ")
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Text input; random values are one to three words.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextControl;

impl Control for TextControl {
    fn render(
        &self,
        _registry: &ControlRegistry,
        _descriptor: &ControlDescriptor,
        label: &str,
        value: Option<&Value>,
    ) -> Widget {
        Widget::Text {
            label: label.into(),
            value: value.map(display_value).unwrap_or_default(),
        }
    }

    fn random_value(
        &self,
        cx: &mut RandomCx<'_>,
        descriptor: &ControlDescriptor,
        _max_size: Option<usize>,
    ) -> Option<Value> {
        let text = random_words(cx, 1, 3);
        cx.finish(descriptor, Value::String(text))
    }
}

/// Number input; random values are integers up to 100.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberControl;

impl Control for NumberControl {
    fn render(
        &self,
        _registry: &ControlRegistry,
        _descriptor: &ControlDescriptor,
        label: &str,
        value: Option<&Value>,
    ) -> Widget {
        Widget::Number {
            label: label.into(),
            value: value.and_then(Value::as_f64),
        }
    }

    fn random_value(
        &self,
        cx: &mut RandomCx<'_>,
        descriptor: &ControlDescriptor,
        _max_size: Option<usize>,
    ) -> Option<Value> {
        let number: u32 = cx.rng.random_range(0..=100);
        cx.finish(descriptor, Value::from(number))
    }
}

/// Checkbox.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanControl;

impl Control for BooleanControl {
    fn render(
        &self,
        _registry: &ControlRegistry,
        _descriptor: &ControlDescriptor,
        label: &str,
        value: Option<&Value>,
    ) -> Widget {
        Widget::Checkbox {
            label: label.into(),
            checked: value.and_then(Value::as_bool).unwrap_or(false),
        }
    }

    fn random_value(
        &self,
        cx: &mut RandomCx<'_>,
        descriptor: &ControlDescriptor,
        _max_size: Option<usize>,
    ) -> Option<Value> {
        let flag = cx.rng.random_bool(0.5);
        cx.finish(descriptor, Value::Bool(flag))
    }
}

/// Select over the descriptor options.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumControl;

impl Control for EnumControl {
    fn render(
        &self,
        _registry: &ControlRegistry,
        descriptor: &ControlDescriptor,
        label: &str,
        value: Option<&Value>,
    ) -> Widget {
        Widget::Select {
            label: label.into(),
            options: descriptor.options.iter().map(display_value).collect(),
            selected: value.and_then(|value| descriptor.options.iter().position(|o| o == value)),
        }
    }

    fn random_value(
        &self,
        cx: &mut RandomCx<'_>,
        descriptor: &ControlDescriptor,
        _max_size: Option<usize>,
    ) -> Option<Value> {
        let option = descriptor.options.choose(&mut *cx.rng)?.clone();
        cx.finish(descriptor, option)
    }
}

/// Edits arrays element by element; every edit yields a new array.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayControl;

impl ArrayControl {
    fn element(descriptor: &ControlDescriptor) -> ControlDescriptor {
        descriptor
            .element
            .as_deref()
            .cloned()
            .unwrap_or_else(|| ControlDescriptor::unknown(true))
    }
}

impl Control for ArrayControl {
    fn render(
        &self,
        registry: &ControlRegistry,
        descriptor: &ControlDescriptor,
        label: &str,
        value: Option<&Value>,
    ) -> Widget {
        let element = Self::element(descriptor);
        let items: Vec<Widget> = value
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| registry.render(&element, &index.to_string(), Some(item)))
                    .collect()
            })
            .unwrap_or_default();
        Widget::List {
            label: label.into(),
            can_remove: !items.is_empty(),
            items,
        }
    }

    fn update(
        &self,
        cx: &mut RandomCx<'_>,
        descriptor: &ControlDescriptor,
        value: Option<&Value>,
        edit: &Edit,
    ) -> Option<Value> {
        let current = value.and_then(Value::as_array);
        match edit {
            Edit::Set(next) => Some(next.clone()),
            Edit::Clear => None,
            Edit::Randomize => self.random_value(cx, descriptor, None),
            Edit::Push => {
                let element = Self::element(descriptor);
                let fresh = cx.random(&element, None).unwrap_or(Value::Null);
                let mut next = current.cloned().unwrap_or_default();
                next.push(fresh);
                Some(Value::Array(next))
            }
            Edit::Pop => {
                let mut next = current.cloned().unwrap_or_default();
                next.pop();
                Some(Value::Array(next))
            }
            Edit::Item { index, edit } => {
                let Some(items) = current else {
                    return value.cloned();
                };
                if *index >= items.len() {
                    return value.cloned();
                }
                let element = Self::element(descriptor);
                let replaced = cx
                    .update(&element, items.get(*index), edit)
                    .unwrap_or(Value::Null);
                let next = items
                    .iter()
                    .enumerate()
                    .map(|(position, item)| {
                        if position == *index {
                            replaced.clone()
                        } else {
                            item.clone()
                        }
                    })
                    .collect();
                Some(Value::Array(next))
            }
            Edit::Field { .. } => value.cloned(),
        }
    }

    fn random_value(
        &self,
        cx: &mut RandomCx<'_>,
        descriptor: &ControlDescriptor,
        max_size: Option<usize>,
    ) -> Option<Value> {
        let limit = max_size.map_or(MAX_RANDOM_ARRAY_LEN, |max| max.min(MAX_RANDOM_ARRAY_LEN));
        let len = cx.rng.random_range(0..=limit);
        let element = Self::element(descriptor);
        let items = (0..len)
            .map(|_| cx.random(&element, None).unwrap_or(Value::Null))
            .collect();
        cx.finish(descriptor, Value::Array(items))
    }
}

/// Edits objects field by field.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectControl;

impl Control for ObjectControl {
    fn render(
        &self,
        registry: &ControlRegistry,
        descriptor: &ControlDescriptor,
        label: &str,
        value: Option<&Value>,
    ) -> Widget {
        let object = value.and_then(Value::as_object);
        let fields = descriptor
            .fields
            .iter()
            .map(|(name, field)| {
                registry.render(field, name, object.and_then(|object| object.get(name.as_str())))
            })
            .collect();
        Widget::Group {
            label: label.into(),
            fields,
        }
    }

    fn update(
        &self,
        cx: &mut RandomCx<'_>,
        descriptor: &ControlDescriptor,
        value: Option<&Value>,
        edit: &Edit,
    ) -> Option<Value> {
        match edit {
            Edit::Set(next) => Some(next.clone()),
            Edit::Clear => None,
            Edit::Randomize => self.random_value(cx, descriptor, None),
            Edit::Field { name, edit } => {
                let Some(field) = descriptor.fields.get(name) else {
                    return value.cloned();
                };
                let current = value.and_then(Value::as_object);
                let existing = current.and_then(|object| object.get(name.as_str()));
                let updated = cx.update(field, existing, edit);
                let mut next: Props = current.cloned().unwrap_or_default();
                match updated {
                    Some(updated) => {
                        next.insert(name.to_string(), updated);
                    }
                    None => {
                        next = next
                            .into_iter()
                            .filter(|(key, _)| key.as_str() != name.as_str())
                            .collect();
                    }
                }
                Some(Value::Object(next))
            }
            Edit::Push | Edit::Pop | Edit::Item { .. } => value.cloned(),
        }
    }

    fn random_value(
        &self,
        cx: &mut RandomCx<'_>,
        descriptor: &ControlDescriptor,
        _max_size: Option<usize>,
    ) -> Option<Value> {
        let mut object = Props::new();
        for (name, field) in &descriptor.fields {
            if let Some(value) = cx.random(field, None) {
                object.insert(name.to_string(), value);
            }
        }
        cx.finish(descriptor, Value::Object(object))
    }
}

/// Functions cannot be expressed as data; shown as a placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionControl;

impl Control for FunctionControl {
    fn render(
        &self,
        _registry: &ControlRegistry,
        _descriptor: &ControlDescriptor,
        label: &str,
        _value: Option<&Value>,
    ) -> Widget {
        Widget::Placeholder {
            label: label.into(),
            note: "function".into(),
        }
    }

    fn update(
        &self,
        _cx: &mut RandomCx<'_>,
        _descriptor: &ControlDescriptor,
        value: Option<&Value>,
        _edit: &Edit,
    ) -> Option<Value> {
        value.cloned()
    }

    fn random_value(
        &self,
        _cx: &mut RandomCx<'_>,
        _descriptor: &ControlDescriptor,
        _max_size: Option<usize>,
    ) -> Option<Value> {
        None
    }
}

/// Renderable children; randomized as short text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeControl;

impl Control for NodeControl {
    fn render(
        &self,
        _registry: &ControlRegistry,
        _descriptor: &ControlDescriptor,
        label: &str,
        value: Option<&Value>,
    ) -> Widget {
        Widget::Placeholder {
            label: label.into(),
            note: value.map_or_else(|| "node".into(), |value| display_value(value).into()),
        }
    }

    fn random_value(
        &self,
        cx: &mut RandomCx<'_>,
        descriptor: &ControlDescriptor,
        _max_size: Option<usize>,
    ) -> Option<Value> {
        let text = random_words(cx, 2, 6);
        cx.finish(descriptor, Value::String(text))
    }
}

/// Placeholder for kinds no control handles. Edits are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownControl;

impl Control for UnknownControl {
    fn render(
        &self,
        _registry: &ControlRegistry,
        descriptor: &ControlDescriptor,
        label: &str,
        _value: Option<&Value>,
    ) -> Widget {
        Widget::Placeholder {
            label: label.into(),
            note: descriptor.control_type(),
        }
    }

    fn update(
        &self,
        _cx: &mut RandomCx<'_>,
        _descriptor: &ControlDescriptor,
        value: Option<&Value>,
        _edit: &Edit,
    ) -> Option<Value> {
        value.cloned()
    }

    fn random_value(
        &self,
        _cx: &mut RandomCx<'_>,
        _descriptor: &ControlDescriptor,
        _max_size: Option<usize>,
    ) -> Option<Value> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::super::{AlwaysPresent, NullOrAbsent};
    use super::*;
    use crate::model::{ControlKind, ScalarKind};
    use indexmap::IndexMap;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use smol_str::SmolStr;

    fn numbers() -> ControlDescriptor {
        ControlDescriptor::array_of(
            ControlDescriptor::new(ControlKind::Scalar(ScalarKind::Number), true),
            true,
        )
    }

    #[test]
    fn random_arrays_stay_within_bounds() {
        let registry = ControlRegistry::with_builtin();
        let mut rng = StdRng::seed_from_u64(42);
        let policy = NullOrAbsent::default();
        let mut cx = RandomCx::new(&registry, &mut rng, &policy);
        let descriptor = numbers();
        let mut seen_empty = false;
        let mut seen_full = false;
        for _ in 0..1000 {
            let value = cx.random(&descriptor, None).expect("required array");
            let len = value.as_array().expect("array").len();
            assert!(len <= MAX_RANDOM_ARRAY_LEN);
            seen_empty |= len == 0;
            seen_full |= len == MAX_RANDOM_ARRAY_LEN;
        }
        assert!(seen_empty && seen_full);
    }

    #[test]
    fn enum_override_without_options_leaves_required_props_absent() {
        use crate::form::PropForm;
        use crate::model::{CustomOverride, PropDeclaration, PropType};

        let mut declarations = IndexMap::new();
        declarations.insert(
            SmolStr::new("label"),
            PropDeclaration::new(PropType::Scalar(ScalarKind::String), true),
        );
        declarations.insert(
            SmolStr::new("count"),
            PropDeclaration::new(PropType::Scalar(ScalarKind::Number), true),
        );
        let mut overrides = IndexMap::new();
        overrides.insert(SmolStr::new("label"), CustomOverride::control("enum"));
        let descriptors = crate::resolve::resolve(&declarations, &overrides);
        assert_eq!(descriptors["label"].kind, ControlKind::Enum);
        assert!(descriptors["label"].options.is_empty());
        assert!(descriptors["label"].required);

        let registry = ControlRegistry::with_builtin();
        let form = PropForm::new(&registry, &descriptors);
        for seed in 0..20 {
            let props = form.random_props(&mut StdRng::seed_from_u64(seed));
            // Nothing to pick from, so the prop is omitted rather than invented.
            assert!(!props.contains_key("label"), "{props:?}");
            assert!(props["count"].is_number());
        }

        let widget = registry.render(&descriptors["label"], "label", None);
        assert_eq!(
            widget,
            Widget::Select {
                label: "label".into(),
                options: Vec::new(),
                selected: None,
            }
        );
    }

    #[test]
    fn random_arrays_respect_smaller_max_size() {
        let registry = ControlRegistry::with_builtin();
        let mut rng = StdRng::seed_from_u64(3);
        let mut cx = RandomCx::new(&registry, &mut rng, &AlwaysPresent);
        for _ in 0..200 {
            let value = cx.random(&numbers(), Some(1)).expect("array");
            assert!(value.as_array().expect("array").len() <= 1);
        }
    }

    #[test]
    fn editing_one_element_leaves_the_original_untouched() {
        let registry = ControlRegistry::with_builtin();
        let mut rng = StdRng::seed_from_u64(5);
        let mut cx = RandomCx::new(&registry, &mut rng, &AlwaysPresent);
        let original = serde_json::json!([1, 2, 3, 4, 5]);
        let edit = Edit::Item {
            index: 2,
            edit: Box::new(Edit::Set(Value::from(30))),
        };
        let next = cx.update(&numbers(), Some(&original), &edit).expect("array");
        assert_eq!(next, serde_json::json!([1, 2, 30, 4, 5]));
        assert_eq!(original, serde_json::json!([1, 2, 3, 4, 5]));
    }

    #[test]
    fn push_appends_one_element_and_pop_removes_the_last() {
        let registry = ControlRegistry::with_builtin();
        let mut rng = StdRng::seed_from_u64(9);
        let mut cx = RandomCx::new(&registry, &mut rng, &AlwaysPresent);
        let original = serde_json::json!([1, 2]);
        let pushed = cx.update(&numbers(), Some(&original), &Edit::Push).expect("array");
        let pushed = pushed.as_array().expect("array");
        assert_eq!(pushed.len(), 3);
        assert!(pushed[2].is_number());

        let popped = cx.update(&numbers(), Some(&original), &Edit::Pop).expect("array");
        assert_eq!(popped, serde_json::json!([1]));

        let from_absent = cx.update(&numbers(), None, &Edit::Push).expect("array");
        assert_eq!(from_absent.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn objects_randomize_every_field() {
        let registry = ControlRegistry::with_builtin();
        let mut rng = StdRng::seed_from_u64(11);
        let mut cx = RandomCx::new(&registry, &mut rng, &AlwaysPresent);
        let mut fields = IndexMap::new();
        fields.insert(
            SmolStr::new("label"),
            ControlDescriptor::new(ControlKind::Scalar(ScalarKind::String), true),
        );
        fields.insert(
            SmolStr::new("count"),
            ControlDescriptor::new(ControlKind::Scalar(ScalarKind::Number), true),
        );
        let descriptor = ControlDescriptor::object_of(fields, true);
        let value = cx.random(&descriptor, None).expect("object");
        let object = value.as_object().expect("object");
        assert!(object["label"].is_string());
        assert!(object["count"].is_number());
    }

    #[test]
    fn field_edits_replace_only_that_field() {
        let registry = ControlRegistry::with_builtin();
        let mut rng = StdRng::seed_from_u64(13);
        let mut cx = RandomCx::new(&registry, &mut rng, &AlwaysPresent);
        let mut fields = IndexMap::new();
        fields.insert(
            SmolStr::new("label"),
            ControlDescriptor::new(ControlKind::Scalar(ScalarKind::String), false),
        );
        fields.insert(
            SmolStr::new("count"),
            ControlDescriptor::new(ControlKind::Scalar(ScalarKind::Number), true),
        );
        let descriptor = ControlDescriptor::object_of(fields, true);
        let original = serde_json::json!({ "label": "a", "count": 1 });
        let edit = Edit::Field {
            name: "count".into(),
            edit: Box::new(Edit::Set(Value::from(2))),
        };
        let next = cx.update(&descriptor, Some(&original), &edit).expect("object");
        assert_eq!(next, serde_json::json!({ "label": "a", "count": 2 }));

        let cleared = Edit::Field {
            name: "label".into(),
            edit: Box::new(Edit::Clear),
        };
        let next = cx.update(&descriptor, Some(&original), &cleared).expect("object");
        assert_eq!(next, serde_json::json!({ "count": 1 }));
    }

    #[test]
    fn enum_picks_declared_options() {
        let registry = ControlRegistry::with_builtin();
        let mut rng = StdRng::seed_from_u64(17);
        let mut cx = RandomCx::new(&registry, &mut rng, &AlwaysPresent);
        let descriptor = ControlDescriptor {
            options: vec![Value::from("primary"), Value::from("ghost")],
            ..ControlDescriptor::new(ControlKind::Enum, true)
        };
        for _ in 0..50 {
            let value = cx.random(&descriptor, None).expect("option");
            assert!(descriptor.options.contains(&value));
        }
        let widget = registry.render(&descriptor, "variant", Some(&Value::from("ghost")));
        assert_eq!(
            widget,
            Widget::Select {
                label: "variant".into(),
                options: vec!["primary".to_string(), "ghost".to_string()],
                selected: Some(1),
            }
        );
    }

    #[test]
    fn functions_are_never_generated() {
        let registry = ControlRegistry::with_builtin();
        let mut rng = StdRng::seed_from_u64(19);
        let mut cx = RandomCx::new(&registry, &mut rng, &AlwaysPresent);
        let descriptor = ControlDescriptor::new(ControlKind::Function, true);
        assert_eq!(cx.random(&descriptor, None), None);
    }
}
