//! MESH mailbox integration
//!
//! This module provides:
//! - The [`MailboxClient`] trait the transfer engine talks to
//! - Token authentication for the MESH API
//! - A synchronous HTTP client for the MESH API v2
//! - Response header parsing into [`MessageMetadata`]
//! - An in-memory mailbox for tests

mod auth;
mod headers;
mod http;
mod memory;

pub use auth::{MailboxCredentials, MeshAuth};
pub use headers::parse_message_headers;
pub use http::MeshClient;
pub use memory::{InMemoryMailbox, MailboxCall};

use crate::models::{MessageId, MessageMetadata};

/// Failure of a mailbox protocol call
///
/// `code` is the HTTP status or a MESH error code; `description` is the
/// human readable detail returned by the mailbox (if any).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("MESH error {code}: {description}")]
pub struct MeshError {
    pub code: String,
    pub description: String,
}

impl MeshError {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }

    /// Error for a request that never got an HTTP response
    pub fn transport(description: impl Into<String>) -> Self {
        Self::new("TRANSPORT", description)
    }
}

/// Result type for mailbox protocol calls
pub type MeshResult<T> = std::result::Result<T, MeshError>;

/// Maximum number of message IDs a single inbox listing returns
pub const MAX_INBOX_PAGE: usize = 500;

/// Upper bound on the chunk count of one message (20GB at 100MB per chunk)
pub const MAX_CHUNKS: u32 = 200;

/// Operations the transfer engine needs from a MESH mailbox
///
/// Every call is a blocking network round-trip in the real client.
pub trait MailboxClient: Send + Sync {
    /// Validate the mailbox session (required at least once every 24 hours)
    fn handshake(&self, mailbox_id: &str) -> MeshResult<()>;

    /// List up to [`MAX_INBOX_PAGE`] pending message IDs, oldest first
    fn list_messages(&self, mailbox_id: &str) -> MeshResult<Vec<MessageId>>;

    /// Fetch header metadata for a message without its body
    fn get_header(&self, mailbox_id: &str, message_id: &MessageId) -> MeshResult<MessageMetadata>;

    /// Download a single-part message body
    fn get_message(&self, mailbox_id: &str, message_id: &MessageId) -> MeshResult<Vec<u8>>;

    /// Download every chunk of a chunked message, in chunk order
    ///
    /// `total_chunks` is the count reported by [`MailboxClient::get_header`].
    fn get_chunked_message(
        &self,
        mailbox_id: &str,
        message_id: &MessageId,
        total_chunks: u32,
    ) -> MeshResult<Vec<Vec<u8>>>;

    /// Remove a message from the inbox
    fn acknowledge(&self, mailbox_id: &str, message_id: &MessageId) -> MeshResult<()>;
}

/// MESH API response types
pub mod api {
    use serde::Deserialize;

    /// Response from the handshake endpoint
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HandshakeResponse {
        pub mailbox_id: String,
    }

    /// Response from listing the inbox
    #[derive(Debug, Deserialize)]
    pub struct CheckInboxResponse {
        #[serde(default)]
        pub messages: Vec<String>,
        pub approx_inbox_count: Option<u64>,
    }

    /// Error body returned with non-2xx responses
    #[derive(Debug, Default, Deserialize)]
    pub struct ErrorResponse {
        pub message_id: Option<String>,
        pub internal_id: Option<String>,
        #[serde(default)]
        pub detail: Vec<ErrorDetail>,
        /// v1 style
        #[serde(rename = "errorDescription")]
        pub error_description: Option<String>,
    }

    /// One entry of an error body
    #[derive(Debug, Deserialize)]
    pub struct ErrorDetail {
        pub event: Option<String>,
        pub code: Option<String>,
        pub msg: Option<String>,
    }

    impl ErrorResponse {
        /// First code reported by the mailbox, if any
        pub fn code(&self) -> Option<&str> {
            self.detail.iter().find_map(|d| d.code.as_deref())
        }

        /// Human readable description of the failure
        pub fn description(&self) -> Option<String> {
            let msgs: Vec<&str> = self
                .detail
                .iter()
                .filter_map(|d| d.msg.as_deref())
                .collect();
            if !msgs.is_empty() {
                return Some(msgs.join("; "));
            }
            self.error_description.clone()
        }
    }
}
