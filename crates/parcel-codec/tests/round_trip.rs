//! End-to-end tests: schema -> record -> bytes -> record.

use parcel_codec::{
    deserialize_message, map_property, record_from_schema, record_from_typed, serialize_message,
    MessageCodec,
};
use parcel_types::config::{CodecConfig, WireFormat};
use parcel_types::descriptor::{DescriptorMap, TypeDescriptor, MAX_NESTING_DEPTH};
use parcel_types::{FieldValue, Message, ParcelError, RecordInstance};
use serde_json::{json, Value};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A schema in the layout produced by model generators: nested models live
/// under `definitions` and are referenced from properties and list items.
fn prd_schema() -> Value {
    json!({
        "title": "PrdOutput",
        "type": "object",
        "properties": {
            "Language": { "type": "string" },
            "Requirements": { "type": "array", "items": { "type": "string" } },
            "Owner": { "$ref": "#/definitions/Person" },
            "Reviewers": { "type": "array", "items": { "$ref": "#/definitions/Person" } },
            "Context": { "type": "object" },
            "Approved": { "type": "boolean" }
        },
        "required": ["Language", "Requirements", "Owner", "Reviewers", "Context", "Approved"],
        "definitions": {
            "Person": {
                "title": "Person",
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "skills": { "type": "array", "items": { "type": "string" } }
                }
            }
        }
    })
}

fn prd_values() -> Value {
    json!({
        "Language": "en_us",
        "Requirements": ["login", "search", "export"],
        "Owner": { "name": "Alice", "skills": ["product"] },
        "Reviewers": [
            { "name": "Bob", "skills": ["rust"] },
            { "name": "Carol", "skills": [] }
        ],
        "Context": { "budget": 1200, "notes": ["tight"], "flag": null },
        "Approved": true
    })
}

fn prd_record() -> RecordInstance {
    record_from_schema(&prd_schema(), prd_values()).unwrap()
}

fn codecs() -> Vec<MessageCodec> {
    [WireFormat::Msgpack, WireFormat::Json]
        .into_iter()
        .map(|wire_format| {
            MessageCodec::new(CodecConfig {
                wire_format,
                ..CodecConfig::default()
            })
        })
        .collect()
}

#[test]
fn test_structured_payload_round_trip() {
    init_tracing();
    let original = Message::new("PRD ready")
        .with_role("Product Manager")
        .with_cause("WritePRD")
        .with_sender("Alice")
        .with_recipients(["Architect"])
        .with_metadata("round", json!(2))
        .with_payload(prd_record());

    for codec in codecs() {
        let bytes = codec.serialize(&original).unwrap();
        let restored = codec.deserialize(&bytes).unwrap();

        let payload = restored.instruct_content.as_ref().unwrap();
        let source = original.instruct_content.as_ref().unwrap();
        assert_eq!(payload.type_name(), "PrdOutput");
        assert_eq!(payload.to_value(), source.to_value());
        assert_eq!(payload.record_type(), source.record_type());
        assert_eq!(restored, original);
    }
}

#[test]
fn test_reconstructed_field_access() {
    let bytes = serialize_message(&Message::new("").with_payload(prd_record())).unwrap();
    let restored = deserialize_message(&bytes).unwrap();
    let payload = restored.instruct_content.unwrap();

    assert_eq!(payload.text("Language"), Some("en_us"));
    let owner = payload.record("Owner").unwrap();
    assert_eq!(owner.text("name"), Some("Alice"));

    let reviewers: Vec<&str> = payload
        .list("Reviewers")
        .unwrap()
        .iter()
        .map(|r| r.as_record().unwrap().text("name").unwrap())
        .collect();
    assert_eq!(reviewers, vec!["Bob", "Carol"]);

    let requirements: Vec<&str> = payload
        .list("Requirements")
        .unwrap()
        .iter()
        .filter_map(FieldValue::as_text)
        .collect();
    assert_eq!(requirements, vec!["login", "search", "export"]);
}

#[test]
fn test_reference_resolution_property() {
    let document = json!({
        "definitions": {
            "Foo": { "type": "object", "properties": { "x": { "type": "string" } } }
        }
    });
    let mut fields = DescriptorMap::new();
    fields.insert("x".to_string(), TypeDescriptor::Str);
    let desc = map_property(&json!({ "$ref": "#/definitions/Foo" }), &document).unwrap();
    assert_eq!(desc, TypeDescriptor::object(fields));
}

#[test]
fn test_opaque_object_accepts_anything() {
    let schema = json!({
        "title": "Envelope",
        "properties": { "blob": { "type": "object" } }
    });
    for raw in [json!(1), json!("text"), json!([{"a": 1}]), json!({"deep": {"er": []}})] {
        let record = record_from_schema(&schema, json!({ "blob": raw.clone() })).unwrap();
        assert_eq!(record.record_type().fields()["blob"], TypeDescriptor::opaque_object());

        let bytes = serialize_message(&Message::new("").with_payload(record)).unwrap();
        let restored = deserialize_message(&bytes).unwrap();
        assert_eq!(restored.instruct_content.unwrap().opaque("blob"), Some(&raw));
    }
}

#[test]
fn test_list_of_referenced_objects_keeps_order() {
    let record = prd_record();
    match &record.record_type().fields()["Reviewers"] {
        TypeDescriptor::List(_) => {}
        other => panic!("Reviewers should be a list, got {other}"),
    }
    assert_eq!(
        record.record_type().fields()["Reviewers"].to_string(),
        "list[object{name: str, skills: list[str]}]"
    );

    let bytes = serialize_message(&Message::new("").with_payload(record)).unwrap();
    let restored = deserialize_message(&bytes).unwrap().instruct_content.unwrap();
    assert_eq!(
        restored.to_value()["Reviewers"],
        json!([
            { "name": "Bob", "skills": ["rust"] },
            { "name": "Carol", "skills": [] }
        ])
    );
}

#[test]
fn test_unknown_shape_passes_through() {
    let record = prd_record();
    assert_eq!(record.record_type().fields()["Approved"], TypeDescriptor::Any);

    for codec in codecs() {
        let bytes = codec
            .serialize(&Message::new("").with_payload(record.clone()))
            .unwrap();
        let restored = codec.deserialize(&bytes).unwrap().instruct_content.unwrap();
        assert_eq!(restored.opaque("Approved"), Some(&json!(true)));
    }
}

#[test]
fn test_mutating_source_after_serialize() {
    let mut message = Message::new("draft").with_payload(prd_record());
    let bytes = serialize_message(&message).unwrap();
    let snapshot = bytes.clone();

    message.content = "edited".to_string();
    let payload = message.instruct_content.as_mut().unwrap();
    payload.set("Language", json!("zh_cn")).unwrap();
    payload.set("Requirements", json!([])).unwrap();

    assert_eq!(bytes, snapshot);
    let restored = deserialize_message(&bytes).unwrap();
    assert_eq!(restored.content, "draft");
    assert_eq!(
        restored.instruct_content.unwrap().text("Language"),
        Some("en_us")
    );
    assert_ne!(serialize_message(&message).unwrap(), snapshot);
}

#[test]
fn test_forwarding_a_restored_message() {
    let first = serialize_message(&Message::new("hop").with_payload(prd_record())).unwrap();
    let restored = deserialize_message(&first).unwrap();
    let second = serialize_message(&restored).unwrap();
    assert_eq!(deserialize_message(&second).unwrap(), restored);
}

#[test]
fn test_cyclic_schema_cannot_be_packed() {
    let schema = json!({
        "title": "Tree",
        "properties": { "root": { "$ref": "#/$defs/Node" } },
        "$defs": {
            "Node": {
                "type": "object",
                "properties": { "child": { "$ref": "#/$defs/Node" } }
            }
        }
    });
    let err = record_from_schema(&schema, json!({ "root": {} })).unwrap_err();
    assert!(matches!(err, ParcelError::CyclicReference { .. }));
}

#[test]
fn test_receiver_needs_no_schema() {
    #[derive(serde::Serialize, schemars::JsonSchema)]
    struct Design {
        summary: String,
        files: Vec<String>,
    }

    let bytes = serialize_message(
        &Message::new("").with_payload(
            record_from_typed(&Design {
                summary: "cache layer".to_string(),
                files: vec!["cache.rs".to_string(), "lib.rs".to_string()],
            })
            .unwrap(),
        ),
    )
    .unwrap();

    // Only the bytes cross over; the Design type is not used below.
    let restored = deserialize_message(&bytes).unwrap().instruct_content.unwrap();
    assert_eq!(restored.type_name(), "Design");
    assert_eq!(restored.text("summary"), Some("cache layer"));
    assert_eq!(restored.list("files").map(<[FieldValue]>::len), Some(2));
}

#[test]
fn test_tampered_payload_is_rejected() {
    let codec = MessageCodec::new(CodecConfig {
        wire_format: WireFormat::Json,
        ..CodecConfig::default()
    });
    let bytes = codec
        .serialize(&Message::new("").with_payload(prd_record()))
        .unwrap();
    let mut wire: Value = serde_json::from_slice(&bytes).unwrap();
    wire["instruct_content"]["value"]["Requirements"] = json!("login");
    let tampered = serde_json::to_vec(&wire).unwrap();

    assert!(matches!(
        codec.deserialize(&tampered),
        Err(ParcelError::CorruptMessage(_))
    ));
}

/// Schema and values for a record whose `inner` field nests `depth` inline
/// objects.
fn deep_chain(depth: usize) -> (Value, Value) {
    let mut node = json!({ "type": "object", "properties": { "leaf": { "type": "string" } } });
    let mut value = json!({ "leaf": "bottom" });
    for _ in 1..depth {
        node = json!({ "type": "object", "properties": { "inner": node } });
        value = json!({ "inner": value });
    }
    (
        json!({ "title": "Chain", "properties": { "inner": node } }),
        json!({ "inner": value }),
    )
}

#[test]
fn test_deepest_buildable_record_round_trips() {
    let (schema, values) = deep_chain(MAX_NESTING_DEPTH);
    let record = record_from_schema(&schema, values.clone()).unwrap();
    let message = Message::new("deep").with_payload(record);

    for codec in codecs() {
        let bytes = codec.serialize(&message).unwrap();
        let restored = codec.deserialize(&bytes).unwrap();
        assert_eq!(restored.instruct_content.unwrap().to_value(), values);
    }
}

#[test]
fn test_record_past_depth_bound_is_never_built() {
    let (schema, values) = deep_chain(MAX_NESTING_DEPTH + 1);
    assert!(matches!(
        record_from_schema(&schema, values),
        Err(ParcelError::UnsupportedSchemaShape { .. })
    ));
}
