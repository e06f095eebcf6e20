//! `$ref` resolution inside a single schema document.

use parcel_types::error::{ParcelError, ParcelResult};
use serde_json::Value;

/// Marker for the document root at the start of a reference.
const ROOT_MARKER: char = '#';

/// Resolve `reference` (e.g. `#/$defs/Foo` or `#/definitions/Foo`) against
/// the root of `document`.
///
/// Each `/`-separated segment is a key lookup (or an index into an array),
/// after JSON-pointer unescaping. Only same-document references are
/// supported. The document is never modified.
pub fn resolve_reference<'a>(document: &'a Value, reference: &str) -> ParcelResult<&'a Value> {
    let pointer = reference
        .strip_prefix(ROOT_MARKER)
        .ok_or_else(|| unresolved(reference, reference))?;
    let pointer = pointer.trim_start_matches('/');

    let mut node = document;
    if pointer.is_empty() {
        return Ok(node);
    }
    for raw in pointer.split('/') {
        let segment = unescape_segment(raw);
        let next = match node {
            Value::Object(map) => map.get(segment.as_str()),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        node = next.ok_or_else(|| unresolved(reference, &segment))?;
    }
    Ok(node)
}

fn unescape_segment(raw: &str) -> String {
    raw.replace("~1", "/").replace("~0", "~")
}

fn unresolved(reference: &str, segment: &str) -> ParcelError {
    ParcelError::UnresolvedReference {
        reference: reference.to_string(),
        segment: segment.to_string(),
    }
}
