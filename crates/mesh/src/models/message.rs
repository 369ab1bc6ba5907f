//! Message model representing a MESH mailbox message header

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a message within a MESH mailbox
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// MESH message type (`mex-messagetype` header)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// A file transfer; the only transferable type
    Data,
    /// A delivery or non-delivery report
    Report,
    /// Anything the mailbox reports that we don't recognise
    Other(String),
}

impl MessageType {
    /// Parse the header value (case-insensitive)
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "DATA" => MessageType::Data,
            "REPORT" => MessageType::Report,
            other => MessageType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Data => "DATA",
            MessageType::Report => "REPORT",
            MessageType::Other(s) => s,
        }
    }
}

/// Header metadata for a mailbox message, fetched without the body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Mailbox message ID
    pub message_id: MessageId,
    /// File name supplied by the sender
    pub file_name: String,
    /// Message type; only DATA messages carry content
    pub message_type: MessageType,
    /// Total chunk count when the body was split by the sender
    pub total_chunks: Option<u32>,
    /// Workflow the sender used (e.g. "BSS_EPISODES")
    pub workflow_id: Option<String>,
    /// Sending mailbox
    pub sender: Option<String>,
    /// Receiving mailbox
    pub recipient: Option<String>,
    /// Sender's own reference for the message
    pub local_id: Option<String>,
    pub subject: Option<String>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
}

impl MessageMetadata {
    /// Create a builder for the required fields
    pub fn builder(message_id: MessageId, file_name: impl Into<String>) -> MessageMetadataBuilder {
        MessageMetadataBuilder::new(message_id, file_name.into())
    }

    /// Whether the content must be fetched chunk by chunk
    pub fn is_chunked(&self) -> bool {
        self.total_chunks.unwrap_or(1) > 1
    }

    pub fn is_data(&self) -> bool {
        self.message_type == MessageType::Data
    }
}

/// Builder for constructing MessageMetadata instances
pub struct MessageMetadataBuilder {
    metadata: MessageMetadata,
}

impl MessageMetadataBuilder {
    fn new(message_id: MessageId, file_name: String) -> Self {
        Self {
            metadata: MessageMetadata {
                message_id,
                file_name,
                message_type: MessageType::Data,
                total_chunks: None,
                workflow_id: None,
                sender: None,
                recipient: None,
                local_id: None,
                subject: None,
                content_type: None,
                content_encoding: None,
            },
        }
    }

    pub fn message_type(mut self, message_type: MessageType) -> Self {
        self.metadata.message_type = message_type;
        self
    }

    pub fn total_chunks(mut self, total_chunks: u32) -> Self {
        self.metadata.total_chunks = Some(total_chunks);
        self
    }

    pub fn workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.metadata.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.metadata.sender = Some(sender.into());
        self
    }

    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.metadata.recipient = Some(recipient.into());
        self
    }

    pub fn local_id(mut self, local_id: impl Into<String>) -> Self {
        self.metadata.local_id = Some(local_id.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.metadata.subject = Some(subject.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.metadata.content_type = Some(content_type.into());
        self
    }

    pub fn content_encoding(mut self, content_encoding: impl Into<String>) -> Self {
        self.metadata.content_encoding = Some(content_encoding.into());
        self
    }

    pub fn build(self) -> MessageMetadata {
        self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_parse() {
        assert_eq!(MessageType::parse("DATA"), MessageType::Data);
        assert_eq!(MessageType::parse("data"), MessageType::Data);
        assert_eq!(MessageType::parse("REPORT"), MessageType::Report);
        assert_eq!(
            MessageType::parse("unknown"),
            MessageType::Other("UNKNOWN".to_string())
        );
    }

    #[test]
    fn test_builder_defaults() {
        let meta = MessageMetadata::builder(MessageId::new("M1"), "bss_episodes.csv").build();
        assert_eq!(meta.message_id.as_str(), "M1");
        assert_eq!(meta.file_name, "bss_episodes.csv");
        assert!(meta.is_data());
        assert!(!meta.is_chunked());
    }

    #[test]
    fn test_is_chunked() {
        let single = MessageMetadata::builder(MessageId::new("M1"), "a.csv")
            .total_chunks(1)
            .build();
        let chunked = MessageMetadata::builder(MessageId::new("M2"), "b.csv")
            .total_chunks(3)
            .build();
        assert!(!single.is_chunked());
        assert!(chunked.is_chunked());
    }
}
