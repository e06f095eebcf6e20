//! Type descriptors: the compact, re-derivable shape of a record field.
//!
//! A descriptor is one of four kinds. `str` is a scalar text field, `list` a
//! sequence whose single-element template describes every element, `object`
//! a nested record (opaque or with known fields), and `any` the escape hatch
//! for shapes the mapper does not model.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deepest list/object nesting a field descriptor may have.
///
/// Every layer enforces this one bound: the mapper, record instantiation and
/// descriptor decoding. At this depth the encoded text of a descriptor stays
/// well inside `serde_json`'s recursion limit (three JSON levels per object,
/// two per list).
pub const MAX_NESTING_DEPTH: usize = 32;

/// Ordered field name -> descriptor mapping.
pub type DescriptorMap = IndexMap<String, TypeDescriptor>;

/// The shape of a single record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case", deny_unknown_fields)]
pub enum TypeDescriptor {
    /// Scalar text.
    Str,
    /// A sequence; the element is the template every item follows.
    List(Box<ListElement>),
    /// A nested object.
    Object(ObjectShape),
    /// Unknown shape; values pass through untouched.
    Any,
}

/// Element template of a list descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListElement {
    /// Bare text elements (`list[str]`).
    Str,
    /// Elements described by a full descriptor, typically a referenced object.
    Nested(TypeDescriptor),
}

/// Detail of an object descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectShape {
    /// No known internal shape.
    Opaque,
    /// Known fields, each with its own descriptor.
    Fields(DescriptorMap),
}

impl TypeDescriptor {
    /// `list[str]`.
    pub fn list_of_str() -> Self {
        TypeDescriptor::List(Box::new(ListElement::Str))
    }

    /// A list whose elements follow `element`.
    pub fn list_of(element: TypeDescriptor) -> Self {
        TypeDescriptor::List(Box::new(ListElement::Nested(element)))
    }

    /// An object with no known fields.
    pub fn opaque_object() -> Self {
        TypeDescriptor::Object(ObjectShape::Opaque)
    }

    /// An object with the given fields.
    pub fn object(fields: DescriptorMap) -> Self {
        TypeDescriptor::Object(ObjectShape::Fields(fields))
    }

    /// The kind tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            TypeDescriptor::Str => "str",
            TypeDescriptor::List(_) => "list",
            TypeDescriptor::Object(_) => "object",
            TypeDescriptor::Any => "any",
        }
    }

    /// Number of nested `list`/`object` levels, counting this one.
    ///
    /// `str`, `any` and opaque objects are 0; `list[str]` is 1.
    pub fn nesting_depth(&self) -> usize {
        match self {
            TypeDescriptor::Str | TypeDescriptor::Any => 0,
            TypeDescriptor::Object(ObjectShape::Opaque) => 0,
            TypeDescriptor::Object(ObjectShape::Fields(fields)) => 1 + mapping_depth(fields),
            TypeDescriptor::List(element) => match element.as_ref() {
                ListElement::Str => 1,
                ListElement::Nested(inner) => 1 + inner.nesting_depth(),
            },
        }
    }
}

/// Deepest [`TypeDescriptor::nesting_depth`] among the fields of `mapping`.
pub fn mapping_depth(mapping: &DescriptorMap) -> usize {
    mapping
        .values()
        .map(TypeDescriptor::nesting_depth)
        .max()
        .unwrap_or(0)
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Str => write!(f, "str"),
            TypeDescriptor::List(element) => match element.as_ref() {
                ListElement::Str => write!(f, "list[str]"),
                ListElement::Nested(inner) => write!(f, "list[{inner}]"),
            },
            TypeDescriptor::Object(ObjectShape::Opaque) => write!(f, "object"),
            TypeDescriptor::Object(ObjectShape::Fields(fields)) => {
                write!(f, "object{{")?;
                for (i, (name, desc)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {desc}")?;
                }
                write!(f, "}}")
            }
            TypeDescriptor::Any => write!(f, "any"),
        }
    }
}
