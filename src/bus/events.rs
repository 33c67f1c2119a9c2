use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A classified inbound message handed to the downstream handler.
///
/// Produced once by the channel's classification pipeline, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel: String,
    pub sender_id: String,
    pub conversation_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl InboundMessage {
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.conversation_id)
    }
}

/// A reply constructed by the caller and consumed exactly once by the channel.
///
/// `media` paths are transmitted before `content` (file frames first, then
/// the text frame).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: String,
    pub conversation_id: String,
    pub content: Option<String>,
    pub media: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl OutboundMessage {
    /// Plain-text reply with no attachments.
    pub fn text(channel: &str, conversation_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            conversation_id: conversation_id.to_string(),
            content: Some(content.to_string()),
            media: vec![],
            metadata: HashMap::new(),
        }
    }
}
