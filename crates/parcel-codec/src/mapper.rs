//! Schema -> type descriptor mapping.
//!
//! Walks a JSON-Schema-shaped document and describes every field with one of
//! the four descriptor kinds:
//!
//! - `{"type": "string"}` -> `str`
//! - `{"type": "array"}` -> `list`, when the items are a `$ref`, strings, or
//!   an inline object
//! - `{"type": "object"}` -> `object`, opaque unless it declares `properties`
//! - anything else -> `any`
//!
//! References are followed wherever they appear. Every reference being
//! expanded sits on a stack, so a schema that refers back into itself fails
//! with `CyclicReference` instead of recursing forever.

use crate::resolver::resolve_reference;
use parcel_types::config::{CodecConfig, ShapePolicy};
use parcel_types::descriptor::{DescriptorMap, TypeDescriptor, MAX_NESTING_DEPTH};
use parcel_types::error::{ParcelError, ParcelResult};
use serde_json::Value;
use tracing::{debug, warn};

/// Maps schema nodes of one document to type descriptors.
#[derive(Debug, Clone, Copy)]
pub struct TypeMapper<'a> {
    document: &'a Value,
    policy: ShapePolicy,
}

/// Map the root object schema of `document` to a descriptor mapping.
pub fn map_schema(document: &Value) -> ParcelResult<DescriptorMap> {
    TypeMapper::new(document).map_schema(document)
}

/// Map a single property node, resolving references against `document`.
pub fn map_property(node: &Value, document: &Value) -> ParcelResult<TypeDescriptor> {
    TypeMapper::new(document).map_property(node)
}

impl<'a> TypeMapper<'a> {
    /// A mapper with the default policy (reject unsupported shapes).
    pub fn new(document: &'a Value) -> Self {
        Self {
            document,
            policy: ShapePolicy::Reject,
        }
    }

    /// A mapper using the shape policy from `config`.
    pub fn with_config(document: &'a Value, config: &CodecConfig) -> Self {
        Self {
            document,
            policy: config.shape_policy,
        }
    }

    /// Map every entry of `node.properties`, in declaration order.
    pub fn map_schema(&self, node: &Value) -> ParcelResult<DescriptorMap> {
        let mut stack = Vec::new();
        let node = match reference_of(node) {
            Some(reference) => {
                stack.push(reference.to_string());
                resolve_reference(self.document, reference)?
            }
            None => node,
        };
        let properties = node
            .get("properties")
            .ok_or_else(|| ParcelError::unsupported("<root>", "schema has no 'properties'"))?;
        let mapping = self.walk_properties(properties, "", 0, &mut stack)?;
        debug!(fields = mapping.len(), "Mapped schema");
        Ok(mapping)
    }

    /// Map a single property node.
    pub fn map_property(&self, node: &Value) -> ParcelResult<TypeDescriptor> {
        self.walk(node, "<property>", 0, &mut Vec::new())
    }

    /// `depth` counts the list/object levels enclosing `node`.
    fn walk(
        &self,
        node: &Value,
        path: &str,
        depth: usize,
        stack: &mut Vec<String>,
    ) -> ParcelResult<TypeDescriptor> {
        if let Some(reference) = reference_of(node) {
            return self.walk_reference(reference, path, depth, stack);
        }
        match node.get("type").and_then(Value::as_str) {
            Some("string") => Ok(TypeDescriptor::Str),
            Some("array") => self.walk_array(node, path, depth, stack),
            Some("object") => match node.get("properties") {
                None => Ok(TypeDescriptor::opaque_object()),
                Some(properties) => {
                    let level = enter(path, depth)?;
                    Ok(TypeDescriptor::object(
                        self.walk_properties(properties, path, level, stack)?,
                    ))
                }
            },
            _ => Ok(TypeDescriptor::Any),
        }
    }

    fn walk_reference(
        &self,
        reference: &str,
        path: &str,
        depth: usize,
        stack: &mut Vec<String>,
    ) -> ParcelResult<TypeDescriptor> {
        if stack.iter().any(|seen| seen == reference) {
            let mut chain = stack.clone();
            chain.push(reference.to_string());
            return Err(ParcelError::CyclicReference { chain });
        }
        // Reference hops add no nesting levels; their chain length is bounded too.
        if stack.len() >= MAX_NESTING_DEPTH {
            return Err(ParcelError::unsupported(
                path,
                format!("reference chain exceeds the maximum depth of {MAX_NESTING_DEPTH}"),
            ));
        }
        let resolved = resolve_reference(self.document, reference)?;
        stack.push(reference.to_string());
        let result = self.walk(resolved, path, depth, stack);
        stack.pop();
        result
    }

    fn walk_array(
        &self,
        node: &Value,
        path: &str,
        depth: usize,
        stack: &mut Vec<String>,
    ) -> ParcelResult<TypeDescriptor> {
        let Some(items) = node.get("items") else {
            return self.unsupported(path, "array declares no 'items'");
        };
        let item_path = format!("{path}[]");
        if let Some(reference) = reference_of(items) {
            let level = enter(path, depth)?;
            let element = self.walk_reference(reference, &item_path, level, stack)?;
            return Ok(TypeDescriptor::list_of(element));
        }
        match items.get("type").and_then(Value::as_str) {
            Some("string") => {
                enter(path, depth)?;
                Ok(TypeDescriptor::list_of_str())
            }
            Some("object") => {
                let level = enter(path, depth)?;
                Ok(TypeDescriptor::list_of(self.walk(items, &item_path, level, stack)?))
            }
            Some(other) => self.unsupported(path, format!("array items of type '{other}'")),
            None => self.unsupported(path, "array items without a 'type'"),
        }
    }

    fn walk_properties(
        &self,
        properties: &Value,
        path: &str,
        depth: usize,
        stack: &mut Vec<String>,
    ) -> ParcelResult<DescriptorMap> {
        let Value::Object(properties) = properties else {
            return Err(ParcelError::unsupported(path, "'properties' is not an object"));
        };
        let mut mapping = DescriptorMap::with_capacity(properties.len());
        for (name, property) in properties {
            let field_path = if path.is_empty() {
                name.clone()
            } else {
                format!("{path}.{name}")
            };
            let descriptor = self.walk(property, &field_path, depth, stack)?;
            mapping.insert(name.clone(), descriptor);
        }
        Ok(mapping)
    }

    fn unsupported(&self, path: &str, reason: impl Into<String>) -> ParcelResult<TypeDescriptor> {
        let reason = reason.into();
        match self.policy {
            ShapePolicy::Reject => Err(ParcelError::unsupported(path, reason)),
            ShapePolicy::DegradeToAny => {
                warn!(field = %path, reason = %reason, "Unsupported schema shape, mapping to any");
                Ok(TypeDescriptor::Any)
            }
        }
    }
}

/// Open one more list/object level below `depth`.
fn enter(path: &str, depth: usize) -> ParcelResult<usize> {
    let level = depth + 1;
    if level > MAX_NESTING_DEPTH {
        return Err(ParcelError::unsupported(
            path,
            format!("nesting exceeds the maximum depth of {MAX_NESTING_DEPTH}"),
        ));
    }
    Ok(level)
}

/// The reference a node stands for: a `$ref` key, or a single-entry `allOf`
/// wrapping one.
fn reference_of(node: &Value) -> Option<&str> {
    if let Some(reference) = node.get("$ref").and_then(Value::as_str) {
        return Some(reference);
    }
    match node.get("allOf").and_then(Value::as_array) {
        Some(all_of) if all_of.len() == 1 => all_of[0].get("$ref").and_then(Value::as_str),
        _ => None,
    }
}
