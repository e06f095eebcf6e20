//! Message serialization with structured payload reconstruction.
//!
//! On the way out, a message's record payload is replaced by the triple
//! `{class, mapping, value}`: the record's type name, its descriptor mapping
//! in text form, and its raw field values. On the way in, the triple is
//! turned back into a record of a freshly defined type. No registry of known
//! types is consulted on either side.

use crate::descriptor_codec::{decode_mapping, encode_mapping, EncodedMapping};
use crate::mapper::TypeMapper;
use parcel_types::config::{CodecConfig, WireFormat};
use parcel_types::error::{ParcelError, ParcelResult};
use parcel_types::message::Message;
use parcel_types::record::{define_type, RecordInstance};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Structured payload as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePayload {
    /// Name of the record type.
    #[serde(rename = "class")]
    pub class_name: String,
    /// Field name -> encoded descriptor.
    pub mapping: EncodedMapping,
    /// Field name -> raw value.
    pub value: serde_json::Value,
}

/// Message envelope as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireEnvelope {
    id: String,
    role: String,
    content: String,
    #[serde(default)]
    cause_by: String,
    #[serde(default)]
    sent_from: String,
    #[serde(default)]
    send_to: BTreeSet<String>,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
    instruct_content: Option<WirePayload>,
}

/// Serializes and deserializes [`Message`]s.
///
/// Holds only immutable configuration, so one codec can be shared freely
/// across threads.
#[derive(Debug, Clone, Default)]
pub struct MessageCodec {
    config: CodecConfig,
}

/// Serialize with the default configuration.
pub fn serialize_message(message: &Message) -> ParcelResult<Vec<u8>> {
    MessageCodec::default().serialize(message)
}

/// Deserialize with the default configuration.
pub fn deserialize_message(bytes: &[u8]) -> ParcelResult<Message> {
    MessageCodec::default().deserialize(bytes)
}

impl MessageCodec {
    /// Create a codec with the given configuration.
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// The codec's configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encode a message to bytes.
    ///
    /// The envelope is copied, so the caller's message (and its payload) can
    /// be mutated afterwards without affecting the returned bytes.
    pub fn serialize(&self, message: &Message) -> ParcelResult<Vec<u8>> {
        let instruct_content = match &message.instruct_content {
            Some(record) => Some(self.pack_payload(record)?),
            None => None,
        };
        let envelope = WireEnvelope {
            id: message.id.clone(),
            role: message.role.clone(),
            content: message.content.clone(),
            cause_by: message.cause_by.clone(),
            sent_from: message.sent_from.clone(),
            send_to: message.send_to.clone(),
            metadata: message.metadata.clone(),
            instruct_content,
        };
        let bytes = match self.config.wire_format {
            WireFormat::Msgpack => rmp_serde::to_vec_named(&envelope)
                .map_err(|e| ParcelError::Serialization(e.to_string()))?,
            WireFormat::Json => serde_json::to_vec(&envelope)
                .map_err(|e| ParcelError::Serialization(e.to_string()))?,
        };
        debug!(id = %message.id, bytes = bytes.len(), "Serialized message");
        Ok(bytes)
    }

    /// Decode bytes produced by [`MessageCodec::serialize`].
    ///
    /// Every failure, including payload reconstruction, is reported as
    /// [`ParcelError::CorruptMessage`].
    pub fn deserialize(&self, bytes: &[u8]) -> ParcelResult<Message> {
        let envelope: WireEnvelope = match self.config.wire_format {
            WireFormat::Msgpack => rmp_serde::from_slice(bytes)
                .map_err(|e| ParcelError::corrupt(ParcelError::Serialization(e.to_string())))?,
            WireFormat::Json => serde_json::from_slice(bytes)
                .map_err(|e| ParcelError::corrupt(ParcelError::Serialization(e.to_string())))?,
        };

        let instruct_content = match envelope.instruct_content {
            Some(payload) => {
                let record = unpack_payload(payload).map_err(|e| {
                    warn!(id = %envelope.id, error = %e, "Rejected structured payload");
                    ParcelError::corrupt(e)
                })?;
                Some(record)
            }
            None => None,
        };

        Ok(Message {
            id: envelope.id,
            role: envelope.role,
            content: envelope.content,
            cause_by: envelope.cause_by,
            sent_from: envelope.sent_from,
            send_to: envelope.send_to,
            metadata: envelope.metadata,
            instruct_content,
        })
    }

    /// Describe a record as a wire payload.
    ///
    /// The mapping is re-derived from the record's own schema rather than
    /// copied from its type, so what goes on the wire is exactly what the
    /// mapper produces.
    pub fn pack_payload(&self, record: &RecordInstance) -> ParcelResult<WirePayload> {
        let schema = record.record_type().json_schema();
        let class_name = record.type_name().to_string();
        let mapping = TypeMapper::with_config(&schema, &self.config).map_schema(&schema)?;
        let encoded = encode_mapping(&mapping)?;
        debug!(class = %class_name, fields = encoded.len(), "Packed structured payload");
        Ok(WirePayload {
            class_name,
            mapping: encoded,
            value: record.to_value(),
        })
    }
}

/// Rebuild a record from a wire payload.
pub fn unpack_payload(payload: WirePayload) -> ParcelResult<RecordInstance> {
    let mapping = decode_mapping(&payload.mapping)?;
    let record_type = define_type(payload.class_name, mapping);
    record_type.instantiate(payload.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_types::descriptor::{DescriptorMap, TypeDescriptor};
    use serde_json::json;

    fn note_record() -> RecordInstance {
        let mut fields = DescriptorMap::new();
        fields.insert("title".to_string(), TypeDescriptor::Str);
        fields.insert("tags".to_string(), TypeDescriptor::list_of_str());
        define_type("Note", fields)
            .instantiate(json!({ "title": "hi", "tags": ["a"] }))
            .unwrap()
    }

    #[test]
    fn test_plain_message_round_trip() {
        let msg = Message::new("just text").with_role("assistant");
        let bytes = serialize_message(&msg).unwrap();
        let back = deserialize_message(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_payload_round_trip_json() {
        let codec = MessageCodec::new(CodecConfig {
            wire_format: WireFormat::Json,
            ..CodecConfig::default()
        });
        let msg = Message::new("with payload").with_payload(note_record());
        let bytes = codec.serialize(&msg).unwrap();
        let wire: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(wire["instruct_content"]["class"], "Note");
        assert_eq!(wire["instruct_content"]["mapping"]["title"], r#"{"kind":"str"}"#);
        assert_eq!(wire["instruct_content"]["value"]["tags"], json!(["a"]));

        let back = codec.deserialize(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_absent_payload_is_null_on_wire() {
        let codec = MessageCodec::new(CodecConfig {
            wire_format: WireFormat::Json,
            ..CodecConfig::default()
        });
        let bytes = codec.serialize(&Message::new("x")).unwrap();
        let wire: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(wire["instruct_content"].is_null());
    }

    #[test]
    fn test_garbage_is_corrupt() {
        for bytes in [&b""[..], &b"\x00\x01\x02"[..], &b"not msgpack at all"[..]] {
            assert!(matches!(
                deserialize_message(bytes),
                Err(ParcelError::CorruptMessage(_))
            ));
        }
    }

    #[test]
    fn test_wrong_envelope_shape_is_corrupt() {
        let bytes = rmp_serde::to_vec_named(&json!({ "id": "1", "content": "no role" })).unwrap();
        assert!(matches!(
            deserialize_message(&bytes),
            Err(ParcelError::CorruptMessage(_))
        ));
    }

    #[test]
    fn test_bad_payload_is_corrupt_with_cause() {
        let envelope = json!({
            "id": "1",
            "role": "user",
            "content": "",
            "instruct_content": {
                "class": "Note",
                "mapping": { "title": "{\"kind\":\"float\"}" },
                "value": { "title": "x" }
            }
        });
        let bytes = rmp_serde::to_vec_named(&envelope).unwrap();
        match deserialize_message(&bytes) {
            Err(ParcelError::CorruptMessage(inner)) => {
                assert!(matches!(*inner, ParcelError::MalformedDescriptor { .. }));
            }
            other => panic!("Expected CorruptMessage, got {other:?}"),
        }
    }

    #[test]
    fn test_value_mismatch_is_corrupt() {
        let envelope = json!({
            "id": "1",
            "role": "user",
            "content": "",
            "instruct_content": {
                "class": "Note",
                "mapping": { "title": "{\"kind\":\"str\"}" },
                "value": { "title": ["not", "text"] }
            }
        });
        let bytes = rmp_serde::to_vec_named(&envelope).unwrap();
        match deserialize_message(&bytes) {
            Err(ParcelError::CorruptMessage(inner)) => {
                assert!(matches!(*inner, ParcelError::FieldMismatch { .. }));
            }
            other => panic!("Expected CorruptMessage, got {other:?}"),
        }
    }

    #[test]
    fn test_class_is_the_record_type_name() {
        let payload = MessageCodec::default().pack_payload(&note_record()).unwrap();
        assert_eq!(payload.class_name, "Note");
        assert_eq!(payload.mapping.len(), 2);
    }

    #[test]
    fn test_codec_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MessageCodec>();
    }
}
