//! `swatch-core` - property schemas, controls and variation sources.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Source codecs for variation and metadata files.
pub mod codec;
/// Control capabilities and the kind registry.
pub mod control;
/// Import of react-docgen property declarations.
pub mod docgen;
/// Decode errors.
pub mod error;
/// Form rendering over resolved descriptors.
pub mod form;
/// Declarations, descriptors, overrides and variations.
pub mod model;
/// Sandbox boot document rendering.
pub mod preview;
/// Override resolution into control descriptors.
pub mod resolve;
/// Variation slugs.
pub mod slug;
/// HTTP and push channel bodies.
pub mod wire;

pub use error::DecodeError;
pub use model::{
    ComponentMetadata, ControlDescriptor, ControlKind, CustomMetadata, CustomOverride,
    PropDeclaration, PropType, Props, ScalarKind, Variation,
};
