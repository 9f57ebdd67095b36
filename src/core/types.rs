//! Common types used across bridge modules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}

/// Role of the party that produced a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    /// Originated from a user (local terminal or UI client)
    User,
    /// Originated from an agent bridge
    Agent,
}

/// Payload of a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageContent {
    /// Ordinary text payload
    Text(String),
    /// Error payload (structurally invalid input, failed delivery)
    Error(String),
}

/// The unit exchanged between bridges, terminals, and UI clients.
///
/// Never mutated after construction; the conversation id is the only field
/// propagated forward across hops.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,
    /// Who produced this message
    pub role: MessageRole,
    /// Text or error payload
    pub content: MessageContent,
    /// Stable across a multi-hop exchange; generated by the router if absent
    pub conversation_id: Option<String>,
    /// The message this one replies to
    pub parent_message_id: Option<String>,
    /// Arbitrary per-hop metadata (path, source agent, peer flags)
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Message {
    /// Create a user message with a fresh ID and no conversation context.
    pub fn user(text: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::User,
            content: MessageContent::Text(text.to_string()),
            conversation_id: None,
            parent_message_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Create an agent reply threaded under `parent`.
    pub fn agent_reply(text: &str, parent: &Message, conversation_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::Agent,
            content: MessageContent::Text(text.to_string()),
            conversation_id: Some(conversation_id.to_string()),
            parent_message_id: Some(parent.id.clone()),
            metadata: HashMap::new(),
        }
    }

    /// Create an error reply threaded under `parent`.
    pub fn error_reply(message: &str, parent: &Message, conversation_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::Agent,
            content: MessageContent::Error(message.to_string()),
            conversation_id: Some(conversation_id.to_string()),
            parent_message_id: Some(parent.id.clone()),
            metadata: HashMap::new(),
        }
    }

    /// Set the conversation ID.
    pub fn with_conversation_id(mut self, conversation_id: &str) -> Self {
        self.conversation_id = Some(conversation_id.to_string());
        self
    }

    /// Add a metadata field.
    pub fn with_meta(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.metadata.insert(key.to_string(), v);
        }
        self
    }

    /// Get the text payload, if this is a text message.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(t) => Some(t),
            MessageContent::Error(_) => None,
        }
    }

    /// Get a metadata field as a string.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Get a metadata field as a bool (absent fields read as false).
    pub fn meta_bool(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> crate::core::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> crate::core::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Metadata keys carried between hops.
pub mod meta {
    /// `>`-joined trace of bridges the conversation has traversed
    pub const PATH: &str = "path";
    /// Agent that originated the current hop
    pub const SOURCE_AGENT: &str = "source_agent";
    /// Set when a terminal already processed this message on our behalf
    pub const IS_FROM_PEER: &str = "is_from_peer";
    /// Set on envelopes delivered to another bridge
    pub const IS_EXTERNAL: &str = "is_external";
    /// Sender bridge of an external delivery
    pub const FROM_AGENT_ID: &str = "from_agent_id";
    /// Recipient bridge of an external delivery
    pub const TO_AGENT_ID: &str = "to_agent_id";
    /// Extra user-supplied context for generation
    pub const ADDITIONAL_CONTEXT: &str = "additional_context";
    /// Marks terminal-bound forwards as user-visible
    pub const IS_USER_MESSAGE: &str = "is_user_message";
    /// Marks terminal-bound forwards as relayed by this bridge
    pub const FORWARDED_BY_BRIDGE: &str = "forwarded_by_bridge";
}
