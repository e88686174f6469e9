//! Controls: the editing widget plus randomization for one descriptor.
//!
//! Every [`ControlKind`] maps to one registered [`Control`]. Unknown kinds, or
//! kinds nobody registered, fall back to a placeholder that ignores edits.

use std::collections::HashMap;
use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

use crate::form::Widget;
use crate::model::{ControlDescriptor, ControlKind, ScalarKind};

mod builtin;
mod policy;

pub use builtin::{
    ArrayControl, BooleanControl, EnumControl, FunctionControl, NodeControl, NumberControl,
    ObjectControl, TextControl, UnknownControl,
};
pub use policy::{AlwaysPresent, NullOrAbsent, OptionalPolicy};

/// Longest array produced by randomization when no tighter bound is given.
pub const MAX_RANDOM_ARRAY_LEN: usize = 4;

/// An edit coming from a rendered widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "arg", rename_all = "camelCase")]
pub enum Edit {
    /// Replace the value.
    Set(Value),
    /// Remove the value (absent).
    Clear,
    /// Replace the value with a random one.
    Randomize,
    /// Append a freshly randomized array element.
    Push,
    /// Remove the last array element.
    Pop,
    /// Edit one array element.
    Item {
        /// Element position.
        index: usize,
        /// Edit applied to the element.
        edit: Box<Edit>,
    },
    /// Edit one object field.
    Field {
        /// Field name.
        name: SmolStr,
        /// Edit applied to the field.
        edit: Box<Edit>,
    },
}

/// Shared state for randomization and edits.
pub struct RandomCx<'a> {
    /// Controls consulted for nested values.
    pub registry: &'a ControlRegistry,
    /// Source of randomness.
    pub rng: &'a mut dyn RngCore,
    /// Decides whether optional values become null or absent.
    pub policy: &'a dyn OptionalPolicy,
}

impl<'a> RandomCx<'a> {
    /// Context over `registry`, `rng` and `policy`.
    pub fn new(
        registry: &'a ControlRegistry,
        rng: &'a mut dyn RngCore,
        policy: &'a dyn OptionalPolicy,
    ) -> Self {
        Self {
            registry,
            rng,
            policy,
        }
    }

    /// Random value for `descriptor` through its registered control.
    pub fn random(
        &mut self,
        descriptor: &ControlDescriptor,
        max_size: Option<usize>,
    ) -> Option<Value> {
        let registry = self.registry;
        registry
            .control_for(descriptor)
            .random_value(self, descriptor, max_size)
    }

    /// Applies `edit` to `value` through the registered control.
    pub fn update(
        &mut self,
        descriptor: &ControlDescriptor,
        value: Option<&Value>,
        edit: &Edit,
    ) -> Option<Value> {
        let registry = self.registry;
        registry
            .control_for(descriptor)
            .update(self, descriptor, value, edit)
    }

    /// Lets the optional policy collapse a generated value.
    pub fn finish(&mut self, descriptor: &ControlDescriptor, value: Value) -> Option<Value> {
        self.policy.finish(self.rng, value, descriptor.required)
    }
}

/// Editing widget and randomization for one control kind.
pub trait Control: Send + Sync {
    /// Widget for the current value; `None` means the property is absent.
    fn render(
        &self,
        registry: &ControlRegistry,
        descriptor: &ControlDescriptor,
        label: &str,
        value: Option<&Value>,
    ) -> Widget;

    /// New value after `edit`. The input value is never mutated.
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
            Edit::Push | Edit::Pop | Edit::Item { .. } | Edit::Field { .. } => value.cloned(),
        }
    }

    /// Random value honoring the descriptor; `None` means absent.
    fn random_value(
        &self,
        cx: &mut RandomCx<'_>,
        descriptor: &ControlDescriptor,
        max_size: Option<usize>,
    ) -> Option<Value>;
}

/// Maps control kinds, and custom kind names, to their controls.
pub struct ControlRegistry {
    by_kind: HashMap<ControlKind, Arc<dyn Control>>,
    by_name: HashMap<SmolStr, Arc<dyn Control>>,
    unknown: Arc<dyn Control>,
}

impl std::fmt::Debug for ControlRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlRegistry")
            .field("kinds", &self.by_kind.keys().collect::<Vec<_>>())
            .field("names", &self.by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ControlRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl ControlRegistry {
    /// Registry that knows no kinds; everything renders as a placeholder.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            by_kind: HashMap::new(),
            by_name: HashMap::new(),
            unknown: Arc::new(UnknownControl),
        }
    }

    /// Registry with a control for every built-in kind.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(ControlKind::Scalar(ScalarKind::String), Arc::new(TextControl));
        registry.register(ControlKind::Scalar(ScalarKind::Number), Arc::new(NumberControl));
        registry.register(ControlKind::Scalar(ScalarKind::Bool), Arc::new(BooleanControl));
        registry.register(ControlKind::Enum, Arc::new(EnumControl));
        registry.register(ControlKind::ArrayOf, Arc::new(ArrayControl));
        registry.register(ControlKind::ObjectOf, Arc::new(ObjectControl));
        registry.register(ControlKind::Function, Arc::new(FunctionControl));
        registry.register(ControlKind::Node, Arc::new(NodeControl));
        registry
    }

    /// Registers `control` for every descriptor of `kind`.
    pub fn register(&mut self, kind: ControlKind, control: Arc<dyn Control>) {
        self.by_kind.insert(kind, control);
    }

    /// Registers a control for descriptors of unknown kind carrying `name`.
    pub fn register_custom(&mut self, name: &str, control: Arc<dyn Control>) {
        self.by_name.insert(SmolStr::new(name), control);
    }

    /// Control for `descriptor`, or the placeholder when none is registered.
    #[must_use]
    pub fn control_for(&self, descriptor: &ControlDescriptor) -> &dyn Control {
        if descriptor.kind == ControlKind::Unknown {
            if let Some(control) = descriptor
                .custom
                .as_ref()
                .and_then(|name| self.by_name.get(name))
            {
                return control.as_ref();
            }
        }
        self.by_kind
            .get(&descriptor.kind)
            .map_or(self.unknown.as_ref(), |control| control.as_ref())
    }

    /// Widget for `value` through the control of `descriptor`.
    #[must_use]
    pub fn render(
        &self,
        descriptor: &ControlDescriptor,
        label: &str,
        value: Option<&Value>,
    ) -> Widget {
        self.control_for(descriptor)
            .render(self, descriptor, label, value)
    }
}
