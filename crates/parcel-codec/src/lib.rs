//! Parcel codec — schema mapping and message serialization.
//!
//! Turns messages carrying runtime-defined records into bytes and back,
//! without any shared registry of record types.
//!
//! ## Architecture
//!
//! - **resolver**: follows `$ref` paths inside one schema document
//! - **mapper**: schema -> field descriptors (`str`, `list`, `object`, `any`)
//! - **descriptor_codec**: descriptors <-> stable text form
//! - **message_codec**: envelope + `{class, mapping, value}` payload <-> bytes
//! - **payload**: records from schema documents or `JsonSchema` types
//! - **config**: TOML configuration loading

pub mod config;
pub mod descriptor_codec;
pub mod mapper;
pub mod message_codec;
pub mod payload;
pub mod resolver;

pub use descriptor_codec::{decode_mapping, encode_mapping, EncodedMapping};
pub use mapper::{map_property, map_schema, TypeMapper};
pub use message_codec::{deserialize_message, serialize_message, MessageCodec, WirePayload};
pub use payload::{record_from_schema, record_from_typed};
pub use resolver::resolve_reference;
