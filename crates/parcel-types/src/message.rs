//! Agent messages: an envelope plus an optional structured payload.

use crate::record::RecordInstance;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Role used when none is given.
pub const DEFAULT_ROLE: &str = "user";

/// Address meaning "every recipient".
pub const MESSAGE_ROUTE_TO_ALL: &str = "<all>";

/// A message exchanged between agents.
///
/// The envelope fields are opaque to the codec; only `instruct_content`
/// receives special handling when the message is serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Unique message ID (UUID, simple form).
    pub id: String,
    /// Role of the sender ("user", "assistant", a role profile, ...).
    pub role: String,
    /// Free-form text content.
    pub content: String,
    /// Name of the action that produced this message.
    pub cause_by: String,
    /// Name of the sending agent.
    pub sent_from: String,
    /// Names of the intended recipients.
    pub send_to: BTreeSet<String>,
    /// Arbitrary envelope metadata.
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Structured payload built from a runtime-defined record type.
    pub instruct_content: Option<RecordInstance>,
}

impl Message {
    /// Create a user message addressed to everyone.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            role: DEFAULT_ROLE.to_string(),
            content: content.into(),
            cause_by: String::new(),
            sent_from: String::new(),
            send_to: BTreeSet::from([MESSAGE_ROUTE_TO_ALL.to_string()]),
            metadata: BTreeMap::new(),
            instruct_content: None,
        }
    }

    /// Set the sender role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Set the action that produced this message.
    pub fn with_cause(mut self, cause_by: impl Into<String>) -> Self {
        self.cause_by = cause_by.into();
        self
    }

    /// Set the sending agent.
    pub fn with_sender(mut self, sent_from: impl Into<String>) -> Self {
        self.sent_from = sent_from.into();
        self
    }

    /// Replace the recipient set.
    pub fn with_recipients<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.send_to = recipients.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Attach a structured payload.
    pub fn with_payload(mut self, payload: RecordInstance) -> Self {
        self.instruct_content = Some(payload);
        self
    }

    /// Whether the message is addressed to `name` (or to everyone).
    pub fn is_addressed_to(&self, name: &str) -> bool {
        self.send_to.contains(MESSAGE_ROUTE_TO_ALL) || self.send_to.contains(name)
    }
}
