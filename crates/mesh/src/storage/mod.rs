//! Blob storage traits and implementations
//!
//! This module defines the blob storage abstraction the transfer engine
//! writes to. The trait-based design allows swapping between Azure, local
//! directory and in-memory implementations.

mod azure;
mod blob;
mod blob_file;
mod connection;
mod memory;

pub use azure::AzureBlobStore;
pub use blob::{BlobExistsError, BlobStore, validate_blob_name, validate_container_name};
pub use blob_file::FileBlobStore;
pub use connection::{BlobConnection, open_blob_store};
pub use memory::InMemoryBlobStore;
