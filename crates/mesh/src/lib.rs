//! Mesh crate - Business logic for moving files out of MESH mailboxes
//!
//! This crate provides:
//! - Domain models (MessageMetadata, BlobFile, HandshakeState)
//! - MESH API client, token authentication and an in-memory mailbox
//! - Blob storage trait with Azure, directory and in-memory backends
//! - The mailbox to blob transfer engine and handshake throttle
//! - Retriever configuration loading
//!
//! Everything here is blocking; callers pick the thread it runs on.

pub mod client;
pub mod config;
pub mod models;
pub mod storage;
pub mod transfer;

pub use client::{MailboxClient, MailboxCredentials, MeshAuth, MeshClient, MeshError, MeshResult};
pub use config::RetrieverConfig;
pub use models::{BlobFile, HandshakeState, MessageId, MessageMetadata, MessageType};
pub use storage::{AzureBlobStore, BlobStore, FileBlobStore, InMemoryBlobStore, open_blob_store};
pub use transfer::{
    HandshakeThrottle, MeshToBlobTransfer, RetrievedFile, TransferError, TransferRequest,
    TransferStats, is_valid_bss_file, negate, original_file_name, retrieve_message,
};
