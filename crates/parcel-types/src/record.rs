//! Dynamic record types and instances.
//!
//! A [`RecordType`] is built at runtime from a name and a [`DescriptorMap`];
//! it is never a compiled Rust type. A [`RecordInstance`] holds one
//! [`FieldValue`] per declared field, checked against the field's descriptor
//! when it is created or updated.

use crate::descriptor::{
    DescriptorMap, ListElement, ObjectShape, TypeDescriptor, MAX_NESTING_DEPTH,
};
use crate::error::{ParcelError, ParcelResult};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Key under which generated schemas store their nested definitions.
pub const DEFS_KEY: &str = "$defs";

/// A runtime-constructed record type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    name: String,
    fields: DescriptorMap,
}

/// A concrete value held by a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Value of a `str` field, or an element of `list[str]`.
    Text(String),
    /// Value of a `list` field, in original order.
    List(Vec<FieldValue>),
    /// Value of an `object` field with known fields.
    Record(RecordInstance),
    /// Raw value of an opaque `object` or `any` field. Callers must interpret it.
    Opaque(Value),
}

/// An instance of a [`RecordType`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordInstance {
    record_type: RecordType,
    values: IndexMap<String, FieldValue>,
}

/// Build a record type with one field per mapping entry.
///
/// Calling this twice with the same inputs yields equal, interchangeable types.
pub fn define_type(name: impl Into<String>, mapping: DescriptorMap) -> RecordType {
    RecordType {
        name: name.into(),
        fields: mapping,
    }
}

/// Instantiate `record_type` from a JSON object of field values.
pub fn instantiate(record_type: &RecordType, values: Value) -> ParcelResult<RecordInstance> {
    record_type.instantiate(values)
}

impl RecordType {
    /// The record type's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field descriptors in declaration order.
    pub fn fields(&self) -> &DescriptorMap {
        &self.fields
    }

    /// Descriptor of a single field.
    pub fn descriptor(&self, field: &str) -> Option<&TypeDescriptor> {
        self.fields.get(field)
    }

    /// Instantiate this type from a JSON object of field values.
    ///
    /// Every declared field must be present, no undeclared field may appear,
    /// and each value must match its descriptor. Types whose fields nest
    /// deeper than [`MAX_NESTING_DEPTH`] cannot be instantiated.
    pub fn instantiate(&self, values: Value) -> ParcelResult<RecordInstance> {
        self.check_depth()?;
        self.instantiate_at(values, &self.name)
    }

    fn check_depth(&self) -> ParcelResult<()> {
        for (name, desc) in &self.fields {
            let depth = desc.nesting_depth();
            if depth > MAX_NESTING_DEPTH {
                return Err(ParcelError::unsupported(
                    format!("{}.{name}", self.name),
                    format!("nests {depth} levels deep, the maximum is {MAX_NESTING_DEPTH}"),
                ));
            }
        }
        Ok(())
    }

    fn instantiate_at(&self, values: Value, path: &str) -> ParcelResult<RecordInstance> {
        let mut supplied = match values {
            Value::Object(map) => map,
            other => {
                return Err(ParcelError::field_mismatch(
                    path,
                    format!("expected an object of field values, found {}", json_kind(&other)),
                ))
            }
        };

        if let Some(extra) = supplied.keys().find(|k| !self.fields.contains_key(*k)) {
            return Err(ParcelError::field_mismatch(
                format!("{path}.{extra}"),
                format!("not a field of '{}'", self.name),
            ));
        }

        let mut out = IndexMap::with_capacity(self.fields.len());
        for (name, desc) in &self.fields {
            let field_path = format!("{path}.{name}");
            let raw = supplied
                .remove(name)
                .ok_or_else(|| ParcelError::field_mismatch(&field_path, "required field is missing"))?;
            out.insert(name.clone(), convert(name, desc, raw, &field_path)?);
        }

        Ok(RecordInstance {
            record_type: self.clone(),
            values: out,
        })
    }

    /// Regenerate a JSON schema document describing this type.
    ///
    /// Nested objects and list element templates are emitted as `$ref`s into
    /// a `$defs` section, the way schema generators lay out nested models.
    pub fn json_schema(&self) -> Value {
        let mut defs = Map::new();
        let mut root = object_schema(&self.name, &self.fields, &mut defs);
        if !defs.is_empty() {
            if let Value::Object(ref mut obj) = root {
                obj.insert(DEFS_KEY.to_string(), Value::Object(defs));
            }
        }
        root
    }
}

impl RecordInstance {
    /// The type this instance was built from.
    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    /// Shorthand for `record_type().name()`.
    pub fn type_name(&self) -> &str {
        self.record_type.name()
    }

    /// Field values in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Value of a field.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Value of a `str` field.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    /// Value of a `list` field.
    pub fn list(&self, field: &str) -> Option<&[FieldValue]> {
        self.get(field).and_then(FieldValue::as_list)
    }

    /// Value of an `object` field with known fields.
    pub fn record(&self, field: &str) -> Option<&RecordInstance> {
        self.get(field).and_then(FieldValue::as_record)
    }

    /// Raw value of an opaque or `any` field.
    pub fn opaque(&self, field: &str) -> Option<&Value> {
        self.get(field).and_then(FieldValue::as_opaque)
    }

    /// Replace a field value, checking it against the field's descriptor.
    pub fn set(&mut self, field: &str, value: Value) -> ParcelResult<()> {
        let path = format!("{}.{field}", self.record_type.name);
        let desc = self.record_type.fields.get(field).ok_or_else(|| {
            ParcelError::field_mismatch(&path, format!("not a field of '{}'", self.record_type.name))
        })?;
        let converted = convert(field, desc, value, &path)?;
        self.values.insert(field.to_string(), converted);
        Ok(())
    }

    /// Dump the instance as a plain JSON object of field values.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }

    /// Convert the instance into a statically typed value.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> ParcelResult<T> {
        serde_json::from_value(self.to_value())
            .map_err(|e| ParcelError::Serialization(e.to_string()))
    }
}

impl FieldValue {
    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Items, if this is a list value.
    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Nested record, if this is a record value.
    pub fn as_record(&self) -> Option<&RecordInstance> {
        match self {
            FieldValue::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Raw value, if this is an opaque value.
    pub fn as_opaque(&self) -> Option<&Value> {
        match self {
            FieldValue::Opaque(v) => Some(v),
            _ => None,
        }
    }

    /// Plain JSON form of this value.
    pub fn to_value(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::List(items) => Value::Array(items.iter().map(FieldValue::to_value).collect()),
            FieldValue::Record(r) => r.to_value(),
            FieldValue::Opaque(v) => v.clone(),
        }
    }
}

/// Check `raw` against `desc` and convert it into a [`FieldValue`].
///
/// `name` names nested record types built for `object` fields.
fn convert(name: &str, desc: &TypeDescriptor, raw: Value, path: &str) -> ParcelResult<FieldValue> {
    match desc {
        TypeDescriptor::Str => expect_text(raw, path),
        TypeDescriptor::List(element) => {
            let items = match raw {
                Value::Array(items) => items,
                other => {
                    return Err(ParcelError::field_mismatch(
                        path,
                        format!("expected a list, found {}", json_kind(&other)),
                    ))
                }
            };
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let item_path = format!("{path}[{i}]");
                let converted = match element.as_ref() {
                    ListElement::Str => expect_text(item, &item_path)?,
                    ListElement::Nested(inner) => convert(name, inner, item, &item_path)?,
                };
                out.push(converted);
            }
            Ok(FieldValue::List(out))
        }
        TypeDescriptor::Object(ObjectShape::Fields(fields)) => {
            let nested = define_type(name, fields.clone());
            Ok(FieldValue::Record(nested.instantiate_at(raw, path)?))
        }
        TypeDescriptor::Object(ObjectShape::Opaque) | TypeDescriptor::Any => {
            Ok(FieldValue::Opaque(raw))
        }
    }
}

fn expect_text(raw: Value, path: &str) -> ParcelResult<FieldValue> {
    match raw {
        Value::String(s) => Ok(FieldValue::Text(s)),
        other => Err(ParcelError::field_mismatch(
            path,
            format!("expected text, found {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// -- Schema generation --

fn object_schema(title: &str, fields: &DescriptorMap, defs: &mut Map<String, Value>) -> Value {
    let mut properties = Map::new();
    for (name, desc) in fields {
        properties.insert(name.clone(), field_schema(name, desc, defs));
    }
    let required: Vec<Value> = fields.keys().cloned().map(Value::String).collect();
    serde_json::json!({
        "title": title,
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn field_schema(name: &str, desc: &TypeDescriptor, defs: &mut Map<String, Value>) -> Value {
    match desc {
        TypeDescriptor::Str => serde_json::json!({ "type": "string" }),
        TypeDescriptor::List(element) => match element.as_ref() {
            ListElement::Str => serde_json::json!({
                "type": "array",
                "items": { "type": "string" },
            }),
            ListElement::Nested(inner) => {
                let item = field_schema(name, inner, defs);
                // Element templates always go through a reference.
                let items = if item.get("$ref").is_some() {
                    item
                } else {
                    register_def(name, item, defs)
                };
                serde_json::json!({ "type": "array", "items": items })
            }
        },
        TypeDescriptor::Object(ObjectShape::Opaque) => serde_json::json!({ "type": "object" }),
        TypeDescriptor::Object(ObjectShape::Fields(fields)) => {
            let nested = object_schema(name, fields, defs);
            register_def(name, nested, defs)
        }
        TypeDescriptor::Any => Value::Object(Map::new()),
    }
}

/// Store `schema` under a fresh `$defs` key derived from `name` and return a
/// reference node pointing at it.
fn register_def(name: &str, schema: Value, defs: &mut Map<String, Value>) -> Value {
    let mut key = name.to_string();
    let mut n = 2;
    while defs.contains_key(&key) {
        key = format!("{name}_{n}");
        n += 1;
    }
    let reference = format!("#/{DEFS_KEY}/{}", escape_pointer_segment(&key));
    defs.insert(key, schema);
    serde_json::json!({ "$ref": reference })
}

/// Escape a single JSON-pointer segment (`~` -> `~0`, `/` -> `~1`).
fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
