//! Content retrieval: download, reassemble chunks, decompress

use log::{error, warn};

use super::gzip;
use crate::client::{MailboxClient, MeshError};
use crate::models::{BlobFile, MessageMetadata};

/// A downloaded message ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedFile {
    pub file: BlobFile,
    /// Gzip content that could not be decompressed; must go to the poison container
    pub poisoned: bool,
}

impl RetrievedFile {
    fn clean(file: BlobFile) -> Self {
        Self {
            file,
            poisoned: false,
        }
    }

    fn poisoned(file: BlobFile) -> Self {
        Self {
            file,
            poisoned: true,
        }
    }
}

/// Download a message and turn it into a blob file.
///
/// Returns None for non-DATA messages and for failed downloads. Gzip content
/// is decompressed; when that fails the compressed bytes are kept and the
/// file name is prefixed with the message ID.
pub fn retrieve_message(
    client: &dyn MailboxClient,
    mailbox_id: &str,
    header: &MessageMetadata,
    file_namer: &dyn Fn(&MessageMetadata) -> String,
) -> Option<RetrievedFile> {
    if !header.is_data() {
        warn!(
            "Message {} is of type {}, not DATA; nothing to retrieve",
            header.message_id,
            header.message_type.as_str()
        );
        return None;
    }

    let content = match header.total_chunks {
        Some(total) if total > 1 => client
            .get_chunked_message(mailbox_id, &header.message_id, total)
            .and_then(|chunks| {
                if chunks.len() == total as usize {
                    Ok(chunks.concat())
                } else {
                    Err(MeshError::new(
                        "CHUNK_RANGE",
                        format!("received {} of {} chunks", chunks.len(), total),
                    ))
                }
            }),
        _ => client.get_message(mailbox_id, &header.message_id),
    };

    let content = match content {
        Ok(content) => content,
        Err(e) => {
            error!(
                "Failed to download message {} from mailbox {}: {}",
                header.message_id, mailbox_id, e
            );
            return None;
        }
    };

    let file_name = file_namer(header);

    if !gzip::is_gzip(&content) {
        return Some(RetrievedFile::clean(BlobFile::new(content, file_name)));
    }

    match gzip::decompress(&content) {
        Ok(decompressed) if !decompressed.content.is_empty() => {
            let name = decompressed
                .embedded_name
                .unwrap_or_else(|| gzip::strip_compression_extension(&file_name).to_string());
            Some(RetrievedFile::clean(BlobFile::new(decompressed.content, name)))
        }
        Ok(_) => {
            warn!(
                "Message {} decompressed to nothing; keeping compressed content",
                header.message_id
            );
            Some(poison(content, header, &file_name))
        }
        Err(e) => {
            warn!(
                "Failed to decompress message {}: {}; keeping compressed content",
                header.message_id, e
            );
            Some(poison(content, header, &file_name))
        }
    }
}

fn poison(content: Vec<u8>, header: &MessageMetadata, file_name: &str) -> RetrievedFile {
    RetrievedFile::poisoned(BlobFile::new(
        content,
        format!("{}_{}", header.message_id, file_name),
    ))
}
