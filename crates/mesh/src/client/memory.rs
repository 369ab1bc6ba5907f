//! In-memory mailbox implementation
//!
//! A scripted stand-in for a MESH mailbox, used by tests and local dry runs.
//! Messages are listed in insertion order, at most [`MAX_INBOX_PAGE`] at a
//! time, until they are acknowledged. Individual operations can be made to
//! fail, and every call is recorded so tests can assert on the exact
//! protocol conversation.

use std::collections::HashSet;
use std::sync::RwLock;

use super::{MAX_INBOX_PAGE, MailboxClient, MeshError, MeshResult};
use crate::models::{MessageId, MessageMetadata};

/// A protocol call made against the in-memory mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxCall {
    Handshake,
    List,
    Header(MessageId),
    Get(MessageId),
    GetChunked(MessageId),
    Acknowledge(MessageId),
}

enum StoredBody {
    Single(Vec<u8>),
    Chunked(Vec<Vec<u8>>),
}

struct StoredMessage {
    metadata: MessageMetadata,
    body: StoredBody,
}

#[derive(Default)]
struct Failures {
    handshake: bool,
    list: bool,
    header: HashSet<String>,
    download: HashSet<String>,
    acknowledge: HashSet<String>,
}

/// In-memory implementation of MailboxClient
pub struct InMemoryMailbox {
    mailbox_id: String,
    messages: RwLock<Vec<StoredMessage>>,
    failures: RwLock<Failures>,
    calls: RwLock<Vec<MailboxCall>>,
}

impl InMemoryMailbox {
    /// Create an empty mailbox answering to `mailbox_id`
    pub fn new(mailbox_id: impl Into<String>) -> Self {
        Self {
            mailbox_id: mailbox_id.into(),
            messages: RwLock::new(Vec::new()),
            failures: RwLock::new(Failures::default()),
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Add a single-part message
    pub fn add_message(&self, metadata: MessageMetadata, content: impl Into<Vec<u8>>) {
        self.messages.write().unwrap().push(StoredMessage {
            metadata,
            body: StoredBody::Single(content.into()),
        });
    }

    /// Add a chunked message; `total_chunks` is set from the chunk count
    pub fn add_chunked_message(&self, mut metadata: MessageMetadata, chunks: Vec<Vec<u8>>) {
        metadata.total_chunks = Some(chunks.len() as u32);
        self.messages.write().unwrap().push(StoredMessage {
            metadata,
            body: StoredBody::Chunked(chunks),
        });
    }

    pub fn fail_handshake(&self) {
        self.failures.write().unwrap().handshake = true;
    }

    pub fn fail_listing(&self) {
        self.failures.write().unwrap().list = true;
    }

    pub fn fail_header(&self, message_id: &str) {
        self.failures.write().unwrap().header.insert(message_id.to_string());
    }

    pub fn fail_download(&self, message_id: &str) {
        self.failures.write().unwrap().download.insert(message_id.to_string());
    }

    pub fn fail_acknowledge(&self, message_id: &str) {
        self.failures.write().unwrap().acknowledge.insert(message_id.to_string());
    }

    /// Number of messages still in the inbox
    pub fn len(&self) -> usize {
        self.messages.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.messages
            .read()
            .unwrap()
            .iter()
            .any(|m| m.metadata.message_id.as_str() == message_id)
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<MailboxCall> {
        self.calls.read().unwrap().clone()
    }

    /// Count calls matching a predicate
    pub fn count_calls(&self, matches: impl Fn(&MailboxCall) -> bool) -> usize {
        self.calls.read().unwrap().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: MailboxCall) {
        self.calls.write().unwrap().push(call);
    }

    fn check_mailbox(&self, mailbox_id: &str) -> MeshResult<()> {
        if mailbox_id == self.mailbox_id {
            Ok(())
        } else {
            Err(MeshError::new("403", format!("Unknown mailbox {}", mailbox_id)))
        }
    }

    fn with_message<T>(
        &self,
        message_id: &MessageId,
        f: impl FnOnce(&StoredMessage) -> MeshResult<T>,
    ) -> MeshResult<T> {
        let messages = self.messages.read().unwrap();
        let message = messages
            .iter()
            .find(|m| &m.metadata.message_id == message_id)
            .ok_or_else(|| {
                MeshError::new("404", format!("Message {} does not exist", message_id))
            })?;
        f(message)
    }
}

impl MailboxClient for InMemoryMailbox {
    fn handshake(&self, mailbox_id: &str) -> MeshResult<()> {
        self.record(MailboxCall::Handshake);
        self.check_mailbox(mailbox_id)?;
        if self.failures.read().unwrap().handshake {
            return Err(MeshError::new("403", "Handshake rejected"));
        }
        Ok(())
    }

    fn list_messages(&self, mailbox_id: &str) -> MeshResult<Vec<MessageId>> {
        self.record(MailboxCall::List);
        self.check_mailbox(mailbox_id)?;
        if self.failures.read().unwrap().list {
            return Err(MeshError::new("500", "Inbox unavailable"));
        }
        Ok(self
            .messages
            .read()
            .unwrap()
            .iter()
            .take(MAX_INBOX_PAGE)
            .map(|m| m.metadata.message_id.clone())
            .collect())
    }

    fn get_header(&self, mailbox_id: &str, message_id: &MessageId) -> MeshResult<MessageMetadata> {
        self.record(MailboxCall::Header(message_id.clone()));
        self.check_mailbox(mailbox_id)?;
        if self.failures.read().unwrap().header.contains(message_id.as_str()) {
            return Err(MeshError::new("500", "Header unavailable"));
        }
        self.with_message(message_id, |m| Ok(m.metadata.clone()))
    }

    fn get_message(&self, mailbox_id: &str, message_id: &MessageId) -> MeshResult<Vec<u8>> {
        self.record(MailboxCall::Get(message_id.clone()));
        self.check_mailbox(mailbox_id)?;
        if self.failures.read().unwrap().download.contains(message_id.as_str()) {
            return Err(MeshError::new("500", "Download failed"));
        }
        self.with_message(message_id, |m| match &m.body {
            StoredBody::Single(content) => Ok(content.clone()),
            StoredBody::Chunked(chunks) => Ok(chunks.first().cloned().unwrap_or_default()),
        })
    }

    fn get_chunked_message(
        &self,
        mailbox_id: &str,
        message_id: &MessageId,
        _total_chunks: u32,
    ) -> MeshResult<Vec<Vec<u8>>> {
        self.record(MailboxCall::GetChunked(message_id.clone()));
        self.check_mailbox(mailbox_id)?;
        if self.failures.read().unwrap().download.contains(message_id.as_str()) {
            return Err(MeshError::new("500", "Download failed"));
        }
        self.with_message(message_id, |m| match &m.body {
            StoredBody::Single(content) => Ok(vec![content.clone()]),
            StoredBody::Chunked(chunks) => Ok(chunks.clone()),
        })
    }

    fn acknowledge(&self, mailbox_id: &str, message_id: &MessageId) -> MeshResult<()> {
        self.record(MailboxCall::Acknowledge(message_id.clone()));
        self.check_mailbox(mailbox_id)?;
        if self.failures.read().unwrap().acknowledge.contains(message_id.as_str()) {
            return Err(MeshError::new("500", "Acknowledge failed"));
        }
        let mut messages = self.messages.write().unwrap();
        let before = messages.len();
        messages.retain(|m| &m.metadata.message_id != message_id);
        if messages.len() == before {
            return Err(MeshError::new("404", format!("Message {} does not exist", message_id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str) -> MessageMetadata {
        MessageMetadata::builder(MessageId::new(id), format!("{}.csv", id)).build()
    }

    #[test]
    fn test_listing_is_capped_and_ordered() {
        let mailbox = InMemoryMailbox::new("MB");
        for i in 0..(MAX_INBOX_PAGE + 3) {
            mailbox.add_message(meta(&format!("M{:04}", i)), b"x".to_vec());
        }

        let page = mailbox.list_messages("MB").unwrap();
        assert_eq!(page.len(), MAX_INBOX_PAGE);
        assert_eq!(page[0].as_str(), "M0000");
        assert_eq!(page[1].as_str(), "M0001");
    }

    #[test]
    fn test_acknowledge_removes_message() {
        let mailbox = InMemoryMailbox::new("MB");
        mailbox.add_message(meta("M1"), b"x".to_vec());

        mailbox.acknowledge("MB", &MessageId::new("M1")).unwrap();

        assert!(mailbox.is_empty());
        assert!(mailbox.acknowledge("MB", &MessageId::new("M1")).is_err());
    }

    #[test]
    fn test_wrong_mailbox_rejected() {
        let mailbox = InMemoryMailbox::new("MB");
        assert!(mailbox.list_messages("OTHER").is_err());
    }

    #[test]
    fn test_chunked_message_sets_total() {
        let mailbox = InMemoryMailbox::new("MB");
        mailbox.add_chunked_message(meta("M1"), vec![b"a".to_vec(), b"b".to_vec()]);

        let header = mailbox.get_header("MB", &MessageId::new("M1")).unwrap();
        assert_eq!(header.total_chunks, Some(2));
        assert_eq!(
            mailbox
                .get_chunked_message("MB", &MessageId::new("M1"), 2)
                .unwrap(),
            vec![b"a".to_vec(), b"b".to_vec()]
        );
    }

    #[test]
    fn test_calls_are_recorded() {
        let mailbox = InMemoryMailbox::new("MB");
        mailbox.add_message(meta("M1"), b"x".to_vec());
        mailbox.fail_header("M1");

        mailbox.handshake("MB").unwrap();
        mailbox.list_messages("MB").unwrap();
        assert!(mailbox.get_header("MB", &MessageId::new("M1")).is_err());

        assert_eq!(
            mailbox.calls(),
            vec![
                MailboxCall::Handshake,
                MailboxCall::List,
                MailboxCall::Header(MessageId::new("M1")),
            ]
        );
    }
}
