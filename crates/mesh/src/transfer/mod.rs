//! Mailbox to blob transfer engine
//!
//! - [`MeshToBlobTransfer`] lists, routes, uploads and acknowledges messages
//! - [`retrieve_message`] downloads content and handles gzip payloads
//! - [`HandshakeThrottle`] keeps handshakes to roughly one a day
//! - [`filters`] holds the predicates and namers the runner passes in

pub mod filters;
mod gzip;
mod handshake;
mod mailbox;
mod retrieve;

pub use filters::{is_valid_bss_file, negate, original_file_name};
pub use gzip::{is_gzip, strip_compression_extension};
pub use handshake::{HandshakeThrottle, STATE_CONTAINER, STATE_FILE_NAME};
pub use mailbox::{MeshToBlobTransfer, TransferError, TransferRequest, TransferStats};
pub use retrieve::{RetrievedFile, retrieve_message};
