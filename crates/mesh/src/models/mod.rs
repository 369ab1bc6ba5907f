//! Domain models for mailbox transfer entities

mod blob_file;
mod handshake_state;
mod message;

pub use blob_file::BlobFile;
pub use handshake_state::{HANDSHAKE_INTERVAL, HandshakeState};
pub use message::{MessageId, MessageMetadata, MessageMetadataBuilder, MessageType};
