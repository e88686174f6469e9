//! Headless property forms.
//!
//! A [`Widget`] tree is what a UI would draw for a property map; [`PropForm`]
//! binds resolved descriptors to a registry and turns edits into new maps.

use indexmap::IndexMap;
use rand::RngCore;
use serde::Serialize;
use serde_json::Value;
use smol_str::SmolStr;

use crate::control::{ControlRegistry, Edit, NullOrAbsent, OptionalPolicy, RandomCx};
use crate::model::{ControlDescriptor, Props};

/// One rendered editing widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "camelCase")]
pub enum Widget {
    /// Single-line text input.
    Text {
        /// Property or field name.
        label: SmolStr,
        /// Current text.
        value: String,
    },
    /// Numeric input.
    Number {
        /// Property or field name.
        label: SmolStr,
        /// Current number, if any.
        value: Option<f64>,
    },
    /// Boolean toggle.
    Checkbox {
        /// Property or field name.
        label: SmolStr,
        /// Current state.
        checked: bool,
    },
    /// Drop-down over literal options.
    Select {
        /// Property or field name.
        label: SmolStr,
        /// Options as JSON text.
        options: Vec<String>,
        /// Index of the current value in `options`.
        selected: Option<usize>,
    },
    /// Editable list with add and remove actions.
    #[serde(rename_all = "camelCase")]
    List {
        /// Property or field name.
        label: SmolStr,
        /// One widget per element.
        items: Vec<Widget>,
        /// Whether an element may be removed.
        can_remove: bool,
    },
    /// Nested fields of an object.
    Group {
        /// Property or field name.
        label: SmolStr,
        /// One widget per field.
        fields: Vec<Widget>,
    },
    /// Read-only stand-in for values no control can edit.
    Placeholder {
        /// Property or field name.
        label: SmolStr,
        /// Why the value cannot be edited.
        note: SmolStr,
    },
}

impl Widget {
    /// Property or field name the widget edits.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Text { label, .. }
            | Self::Number { label, .. }
            | Self::Checkbox { label, .. }
            | Self::Select { label, .. }
            | Self::List { label, .. }
            | Self::Group { label, .. }
            | Self::Placeholder { label, .. } => label.as_str(),
        }
    }
}

/// The form for one component: descriptors bound to a registry.
pub struct PropForm<'a> {
    registry: &'a ControlRegistry,
    descriptors: &'a IndexMap<SmolStr, ControlDescriptor>,
    policy: &'a dyn OptionalPolicy,
}

impl<'a> PropForm<'a> {
    /// Form with the default optional policy.
    pub fn new(
        registry: &'a ControlRegistry,
        descriptors: &'a IndexMap<SmolStr, ControlDescriptor>,
    ) -> Self {
        const DEFAULT_POLICY: NullOrAbsent = NullOrAbsent {
            null_probability: 0.1,
            absent_probability: 0.1,
        };
        Self {
            registry,
            descriptors,
            policy: &DEFAULT_POLICY,
        }
    }

    /// Replaces the optional policy used for random values.
    #[must_use]
    pub fn with_policy(mut self, policy: &'a dyn OptionalPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// One widget per descriptor, in declaration order.
    #[must_use]
    pub fn render(&self, props: &Props) -> Vec<Widget> {
        self.descriptors
            .iter()
            .map(|(name, descriptor)| {
                self.registry
                    .render(descriptor, name, props.get(name.as_str()))
            })
            .collect()
    }

    /// Returns a new map with `edit` applied to `prop`; `props` is untouched.
    ///
    /// Edits to properties without a descriptor are ignored.
    #[must_use]
    pub fn apply(&self, rng: &mut dyn RngCore, props: &Props, prop: &str, edit: &Edit) -> Props {
        let Some(descriptor) = self.descriptors.get(prop) else {
            return props.clone();
        };
        let mut cx = RandomCx::new(self.registry, rng, self.policy);
        let updated = cx.update(descriptor, props.get(prop), edit);
        match updated {
            Some(value) => {
                let mut next = props.clone();
                next.insert(prop.to_string(), value);
                next
            }
            None => props
                .iter()
                .filter(|(name, _)| name.as_str() != prop)
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    /// A fresh random value for every descriptor; absent ones are omitted.
    #[must_use]
    pub fn random_props(&self, rng: &mut dyn RngCore) -> Props {
        let mut cx = RandomCx::new(self.registry, rng, self.policy);
        let mut props = Props::new();
        for (name, descriptor) in self.descriptors {
            if let Some(value) = cx.random(descriptor, None) {
                props.insert(name.to_string(), value);
            }
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::AlwaysPresent;
    use crate::model::{ControlKind, ScalarKind};
    use expect_test::expect;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn descriptors() -> IndexMap<SmolStr, ControlDescriptor> {
        let mut descriptors = IndexMap::new();
        descriptors.insert(
            SmolStr::new("title"),
            ControlDescriptor::new(ControlKind::Scalar(ScalarKind::String), true),
        );
        descriptors.insert(
            SmolStr::new("disabled"),
            ControlDescriptor::new(ControlKind::Scalar(ScalarKind::Bool), false),
        );
        descriptors.insert(
            SmolStr::new("sizes"),
            ControlDescriptor::array_of(
                ControlDescriptor::new(ControlKind::Scalar(ScalarKind::Number), true),
                false,
            ),
        );
        descriptors
    }

    fn props(value: Value) -> Props {
        match value {
            Value::Object(map) => map,
            _ => Props::new(),
        }
    }

    #[test]
    fn render_follows_declaration_order() {
        let registry = ControlRegistry::with_builtin();
        let descriptors = descriptors();
        let form = PropForm::new(&registry, &descriptors);
        let widgets = form.render(&props(json!({ "sizes": [1], "title": "Hi" })));
        let labels: Vec<_> = widgets.iter().map(Widget::label).collect();
        assert_eq!(labels, ["title", "disabled", "sizes"]);
    }

    #[test]
    fn widgets_serialize_as_tagged_objects() {
        let registry = ControlRegistry::with_builtin();
        let descriptors = descriptors();
        let form = PropForm::new(&registry, &descriptors);
        let widgets = form.render(&props(json!({ "title": "Hi", "sizes": [2] })));
        let json = serde_json::to_string(&widgets).expect("serialize");
        expect![[r#"[{"widget":"text","label":"title","value":"Hi"},{"widget":"checkbox","label":"disabled","checked":false},{"widget":"list","label":"sizes","items":[{"widget":"number","label":"0","value":2.0}],"canRemove":true}]"#]]
        .assert_eq(&json);
    }

    #[test]
    fn apply_never_mutates_the_input_map() {
        let registry = ControlRegistry::with_builtin();
        let descriptors = descriptors();
        let form = PropForm::new(&registry, &descriptors);
        let mut rng = StdRng::seed_from_u64(1);
        let original = props(json!({ "title": "Hi", "sizes": [1, 2, 3] }));
        let edit = Edit::Item {
            index: 0,
            edit: Box::new(Edit::Set(json!(10))),
        };
        let next = form.apply(&mut rng, &original, "sizes", &edit);
        assert_eq!(next["sizes"], json!([10, 2, 3]));
        assert_eq!(original["sizes"], json!([1, 2, 3]));

        let cleared = form.apply(&mut rng, &original, "title", &Edit::Clear);
        assert!(!cleared.contains_key("title"));
        assert!(original.contains_key("title"));
    }

    #[test]
    fn undeclared_props_ignore_edits() {
        let registry = ControlRegistry::with_builtin();
        let descriptors = descriptors();
        let form = PropForm::new(&registry, &descriptors);
        let mut rng = StdRng::seed_from_u64(1);
        let original = props(json!({ "title": "Hi" }));
        let next = form.apply(&mut rng, &original, "ghost", &Edit::Set(json!(1)));
        assert_eq!(next, original);
    }

    #[test]
    fn random_props_cover_required_descriptors() {
        let registry = ControlRegistry::with_builtin();
        let descriptors = descriptors();
        let form = PropForm::new(&registry, &descriptors).with_policy(&AlwaysPresent);
        let mut rng = StdRng::seed_from_u64(4);
        let generated = form.random_props(&mut rng);
        assert!(generated["title"].is_string());
        assert!(generated["disabled"].is_boolean());
        assert!(generated["sizes"].is_array());
    }

    #[test]
    fn seeded_randomization_is_reproducible() {
        let registry = ControlRegistry::with_builtin();
        let descriptors = descriptors();
        let form = PropForm::new(&registry, &descriptors);
        let first = form.random_props(&mut StdRng::seed_from_u64(99));
        let second = form.random_props(&mut StdRng::seed_from_u64(99));
        assert_eq!(first, second);
    }
}
