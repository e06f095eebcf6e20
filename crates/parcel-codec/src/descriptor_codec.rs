//! Text form of descriptor mappings.
//!
//! Each descriptor is stored as a compact tagged JSON string, e.g.
//! `{"kind":"list","detail":{"nested":{"kind":"object","detail":"opaque"}}}`.
//! Decoding accepts exactly the four kinds and nothing else; stored text is
//! parsed, never interpreted. Both directions refuse descriptors nested
//! deeper than [`MAX_NESTING_DEPTH`], so anything encoded here decodes again.

use indexmap::IndexMap;
use parcel_types::descriptor::{DescriptorMap, TypeDescriptor, MAX_NESTING_DEPTH};
use parcel_types::error::{ParcelError, ParcelResult};

/// Field name -> encoded descriptor string.
pub type EncodedMapping = IndexMap<String, String>;

/// Encode one descriptor.
pub fn encode_descriptor(descriptor: &TypeDescriptor) -> ParcelResult<String> {
    serde_json::to_string(descriptor).map_err(|e| ParcelError::Serialization(e.to_string()))
}

/// Decode one descriptor string; `field` is only used for diagnostics.
pub fn decode_descriptor(field: &str, text: &str) -> ParcelResult<TypeDescriptor> {
    let descriptor: TypeDescriptor =
        serde_json::from_str(text).map_err(|e| ParcelError::MalformedDescriptor {
            field: field.to_string(),
            reason: e.to_string(),
        })?;
    check_depth(field, &descriptor)?;
    Ok(descriptor)
}

fn check_depth(field: &str, descriptor: &TypeDescriptor) -> ParcelResult<()> {
    let depth = descriptor.nesting_depth();
    if depth > MAX_NESTING_DEPTH {
        return Err(ParcelError::MalformedDescriptor {
            field: field.to_string(),
            reason: format!("nests {depth} levels deep, the maximum is {MAX_NESTING_DEPTH}"),
        });
    }
    Ok(())
}

/// Encode every descriptor of a mapping, keeping field order.
pub fn encode_mapping(mapping: &DescriptorMap) -> ParcelResult<EncodedMapping> {
    let mut encoded = EncodedMapping::with_capacity(mapping.len());
    for (field, descriptor) in mapping {
        check_depth(field, descriptor)?;
        encoded.insert(field.clone(), encode_descriptor(descriptor)?);
    }
    Ok(encoded)
}

/// Decode every descriptor string of an encoded mapping, keeping field order.
pub fn decode_mapping(encoded: &EncodedMapping) -> ParcelResult<DescriptorMap> {
    let mut mapping = DescriptorMap::with_capacity(encoded.len());
    for (field, text) in encoded {
        mapping.insert(field.clone(), decode_descriptor(field, text)?);
    }
    Ok(mapping)
}
