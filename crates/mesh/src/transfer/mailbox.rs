//! Mailbox to blob transfer
//!
//! One call drains a mailbox: list a page, route every message to the
//! destination or poison container, upload it, acknowledge it, repeat while
//! pages come back full.

use log::{error, info};
use std::sync::Arc;
use std::time::Instant;

use super::retrieve::retrieve_message;
use crate::client::{MAX_INBOX_PAGE, MailboxClient, MeshError};
use crate::models::{MessageId, MessageMetadata};
use crate::storage::BlobStore;

/// Where to read from and where to write to for one transfer pass
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub mailbox_id: String,
    /// Container for messages matching the predicate
    pub destination_container: String,
    /// Container for messages that fail the predicate or decompression
    pub poison_container: String,
    pub execute_handshake: bool,
}

/// Statistics from a transfer pass
#[derive(Debug, Default, Clone)]
pub struct TransferStats {
    /// Number of inbox listings made
    pub pages: usize,
    /// Number of message IDs listed
    pub messages_found: usize,
    /// Number of messages uploaded
    pub messages_moved: usize,
    /// Number of messages left in the mailbox (header, download or upload failure)
    pub messages_skipped: usize,
    /// Number of uploads that went to the poison container
    pub messages_poisoned: usize,
    /// Uploaded messages the mailbox refused to acknowledge
    pub acknowledge_failures: usize,
    /// Duration of the transfer pass
    pub duration_ms: u64,
}

/// Failures that end a transfer pass
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Handshake with mailbox {mailbox_id} failed: {source}")]
    Handshake {
        mailbox_id: String,
        source: MeshError,
    },

    #[error("Listing messages in mailbox {mailbox_id} failed: {source}")]
    ListMessages {
        mailbox_id: String,
        source: MeshError,
    },

    #[error("Mailbox {mailbox_id} returned a full page but no message could be moved")]
    MailboxSaturated { mailbox_id: String },
}

enum MessageOutcome {
    Skipped,
    Moved { poisoned: bool, acknowledged: bool },
}

/// Moves files from a MESH mailbox into blob containers
pub struct MeshToBlobTransfer {
    mailbox: Arc<dyn MailboxClient>,
    blobs: Arc<dyn BlobStore>,
}

impl MeshToBlobTransfer {
    pub fn new(mailbox: Arc<dyn MailboxClient>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { mailbox, blobs }
    }

    /// Drain the mailbox into blob storage.
    ///
    /// Messages matching `predicate` go to the destination container, all
    /// others to the poison container, named by `file_namer`. A message is
    /// acknowledged only after its upload succeeded, so anything skipped is
    /// picked up again by the next pass.
    pub fn move_files_from_mesh_to_blob(
        &self,
        predicate: &dyn Fn(&MessageMetadata) -> bool,
        file_namer: &dyn Fn(&MessageMetadata) -> String,
        request: &TransferRequest,
    ) -> Result<TransferStats, TransferError> {
        let start = Instant::now();
        let mut stats = TransferStats::default();
        let mailbox_id = request.mailbox_id.as_str();

        if request.execute_handshake {
            if let Err(e) = self.mailbox.handshake(mailbox_id) {
                error!(
                    "Handshake with mailbox {} failed. Code: {}, Description: {}",
                    mailbox_id, e.code, e.description
                );
                return Err(TransferError::Handshake {
                    mailbox_id: mailbox_id.to_string(),
                    source: e,
                });
            }
            info!("Handshake with mailbox {} succeeded", mailbox_id);
        }

        loop {
            let message_ids = match self.mailbox.list_messages(mailbox_id) {
                Ok(ids) => ids,
                Err(e) => {
                    error!(
                        "CRITICAL: Failed to list messages in mailbox {}. Code: {}, Description: {}",
                        mailbox_id, e.code, e.description
                    );
                    return Err(TransferError::ListMessages {
                        mailbox_id: mailbox_id.to_string(),
                        source: e,
                    });
                }
            };
            stats.pages += 1;

            if message_ids.is_empty() {
                info!("No messages in mailbox {}", mailbox_id);
                break;
            }

            let page_size = message_ids.len();
            stats.messages_found += page_size;
            info!(
                "Found {} messages in mailbox {} (page {})",
                page_size, mailbox_id, stats.pages
            );

            let moved = self.move_page(&message_ids, predicate, file_namer, request, &mut stats);

            if page_size == MAX_INBOX_PAGE && moved == 0 {
                error!(
                    "CRITICAL: Mailbox {} returned {} messages and none could be moved; \
                     the inbox is blocked",
                    mailbox_id, page_size
                );
                return Err(TransferError::MailboxSaturated {
                    mailbox_id: mailbox_id.to_string(),
                });
            }

            if page_size < MAX_INBOX_PAGE {
                break;
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Transfer from mailbox {} complete: {} found, {} moved, {} poisoned, {} skipped in {}ms",
            mailbox_id,
            stats.messages_found,
            stats.messages_moved,
            stats.messages_poisoned,
            stats.messages_skipped,
            stats.duration_ms
        );
        Ok(stats)
    }

    /// Process one listing page; returns the number of uploaded messages
    fn move_page(
        &self,
        message_ids: &[MessageId],
        predicate: &dyn Fn(&MessageMetadata) -> bool,
        file_namer: &dyn Fn(&MessageMetadata) -> String,
        request: &TransferRequest,
        stats: &mut TransferStats,
    ) -> usize {
        let mut moved = 0;

        for message_id in message_ids {
            match self.move_message(message_id, predicate, file_namer, request) {
                MessageOutcome::Skipped => stats.messages_skipped += 1,
                MessageOutcome::Moved {
                    poisoned,
                    acknowledged,
                } => {
                    moved += 1;
                    stats.messages_moved += 1;
                    if poisoned {
                        stats.messages_poisoned += 1;
                    }
                    if !acknowledged {
                        stats.acknowledge_failures += 1;
                    }
                }
            }
        }

        moved
    }

    fn move_message(
        &self,
        message_id: &MessageId,
        predicate: &dyn Fn(&MessageMetadata) -> bool,
        file_namer: &dyn Fn(&MessageMetadata) -> String,
        request: &TransferRequest,
    ) -> MessageOutcome {
        let mailbox_id = request.mailbox_id.as_str();

        let header = match self.mailbox.get_header(mailbox_id, message_id) {
            Ok(header) => header,
            Err(e) => {
                error!(
                    "CRITICAL: Failed to get header for message {}. Code: {}, Description: {}",
                    message_id, e.code, e.description
                );
                return MessageOutcome::Skipped;
            }
        };

        let mut container = if predicate(&header) {
            request.destination_container.as_str()
        } else {
            info!(
                "File {} (message {}) does not match this pass; routing to {}",
                header.file_name, message_id, request.poison_container
            );
            request.poison_container.as_str()
        };

        let retrieved =
            retrieve_message(self.mailbox.as_ref(), mailbox_id, &header, file_namer);
        let Some(retrieved) = retrieved else {
            error!(
                "CRITICAL: Failed to retrieve message {} from mailbox {}",
                message_id, mailbox_id
            );
            return MessageOutcome::Skipped;
        };

        if retrieved.poisoned {
            container = request.poison_container.as_str();
        }
        let poisoned = container == request.poison_container;
        let file = retrieved.file;

        if let Err(e) = self.blobs.upload(container, &file, true) {
            error!(
                "Failed to upload {} to container {}: {:#}; message {} stays in the mailbox",
                file.file_name, container, e, message_id
            );
            return MessageOutcome::Skipped;
        }

        if file.file_name.starts_with(message_id.as_str()) {
            info!(
                "Uploaded poisoned file {} to container {}",
                file.file_name, container
            );
        } else {
            info!(
                "Uploaded {} ({} bytes) to container {}",
                file.file_name,
                file.len(),
                container
            );
        }

        let acknowledged = match self.mailbox.acknowledge(mailbox_id, message_id) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "CRITICAL: Failed to acknowledge message {}. Code: {}, Description: {}; \
                     it will be delivered again",
                    message_id, e.code, e.description
                );
                false
            }
        };

        MessageOutcome::Moved {
            poisoned,
            acknowledged,
        }
    }
}
