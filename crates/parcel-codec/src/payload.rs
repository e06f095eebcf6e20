//! Building record payloads from schemas and typed values.

use crate::mapper::TypeMapper;
use parcel_types::config::CodecConfig;
use parcel_types::error::{ParcelError, ParcelResult};
use parcel_types::record::{define_type, RecordInstance};
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

/// Build a record from a schema document and matching field values.
///
/// The record type is named after the schema's `title`.
pub fn record_from_schema(schema: &Value, values: Value) -> ParcelResult<RecordInstance> {
    record_from_schema_with(&CodecConfig::default(), schema, values)
}

/// [`record_from_schema`] with an explicit mapper configuration.
pub fn record_from_schema_with(
    config: &CodecConfig,
    schema: &Value,
    values: Value,
) -> ParcelResult<RecordInstance> {
    let title = schema
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| ParcelError::unsupported("<root>", "schema has no 'title'"))?;
    let mapping = TypeMapper::with_config(schema, config).map_schema(schema)?;
    define_type(title, mapping).instantiate(values)
}

/// Build a record from any value whose type can describe itself as a JSON
/// schema.
pub fn record_from_typed<T>(value: &T) -> ParcelResult<RecordInstance>
where
    T: JsonSchema + Serialize,
{
    let schema = serde_json::to_value(schemars::schema_for!(T))
        .map_err(|e| ParcelError::Serialization(e.to_string()))?;
    let values =
        serde_json::to_value(value).map_err(|e| ParcelError::Serialization(e.to_string()))?;
    record_from_schema(&schema, values)
}
