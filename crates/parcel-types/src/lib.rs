//! Core types for Parcel, the structured-payload message codec.
//!
//! This crate defines the data model shared by the codec: type descriptors,
//! runtime record types and instances, the message envelope, configuration
//! and errors. Schema walking and byte encoding live in `parcel-codec`.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod message;
pub mod record;

pub use descriptor::{
    mapping_depth, DescriptorMap, ListElement, ObjectShape, TypeDescriptor, MAX_NESTING_DEPTH,
};
pub use error::{ParcelError, ParcelResult};
pub use message::Message;
pub use record::{define_type, instantiate, FieldValue, RecordInstance, RecordType};
