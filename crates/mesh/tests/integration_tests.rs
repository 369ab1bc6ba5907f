//! Integration tests for the mesh crate
//!
//! These tests drive the complete flow from mailbox listing to blobs on
//! disk, using the in-memory mailbox and the directory blob store.

use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use std::io::Write;
use std::sync::Arc;

use mesh::client::{InMemoryMailbox, MAX_INBOX_PAGE, MailboxCall};
use mesh::models::{MessageId, MessageMetadata, MessageType};
use mesh::storage::{BlobStore, FileBlobStore, InMemoryBlobStore};
use mesh::transfer::{
    HandshakeThrottle, MeshToBlobTransfer, STATE_CONTAINER, STATE_FILE_NAME, TransferError,
    TransferRequest, is_valid_bss_file, negate, original_file_name,
};
use tempfile::TempDir;

const MAILBOX: &str = "X26ABC1";
const INBOUND: &str = "inbound";
const POISON: &str = "inbound-poison";

/// Helper to create message headers
fn make_header(id: &str, file_name: &str) -> MessageMetadata {
    MessageMetadata::builder(MessageId::new(id), file_name)
        .workflow_id("BSS_EPISODES")
        .sender("X26SEND")
        .recipient(MAILBOX)
        .build()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn request(destination: &str, execute_handshake: bool) -> TransferRequest {
    TransferRequest {
        mailbox_id: MAILBOX.to_string(),
        destination_container: destination.to_string(),
        poison_container: POISON.to_string(),
        execute_handshake,
    }
}

fn create_file_store() -> (Arc<FileBlobStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileBlobStore::new(dir.path()).unwrap());
    (store, dir)
}

/// Run both passes the way the retriever does on every tick
fn run_cycle(
    transfer: &MeshToBlobTransfer,
    throttle: &HandshakeThrottle,
) -> (bool, bool) {
    let handshake = throttle.should_handshake();
    let valid = transfer
        .move_files_from_mesh_to_blob(
            &is_valid_bss_file,
            &original_file_name,
            &request(INBOUND, handshake),
        )
        .is_ok();
    let poison = transfer
        .move_files_from_mesh_to_blob(
            &negate(is_valid_bss_file),
            &original_file_name,
            &request(POISON, false),
        )
        .is_ok();
    (valid, poison)
}

#[test]
fn test_valid_file_lands_in_destination() {
    let mailbox = Arc::new(InMemoryMailbox::new(MAILBOX));
    let (store, dir) = create_file_store();
    let transfer = MeshToBlobTransfer::new(mailbox.clone(), store.clone());

    let content = b"nhs_number,episode_id\n9000000009,1\n".to_vec();
    mailbox.add_message(make_header("M1", "bss_episodes.csv"), content.clone());

    let stats = transfer
        .move_files_from_mesh_to_blob(
            &is_valid_bss_file,
            &original_file_name,
            &request(INBOUND, false),
        )
        .unwrap();

    assert_eq!(stats.messages_moved, 1);
    assert_eq!(stats.messages_poisoned, 0);
    assert_eq!(
        std::fs::read(dir.path().join(INBOUND).join("bss_episodes.csv")).unwrap(),
        content
    );
    assert!(!dir.path().join(POISON).exists());
    assert!(mailbox.is_empty());
    assert_eq!(
        mailbox.count_calls(|c| *c == MailboxCall::Acknowledge(MessageId::new("M1"))),
        1
    );
}

#[test]
fn test_invalid_file_lands_in_poison() {
    let mailbox = Arc::new(InMemoryMailbox::new(MAILBOX));
    let (store, dir) = create_file_store();
    let transfer = MeshToBlobTransfer::new(mailbox.clone(), store.clone());

    mailbox.add_message(make_header("M1", "invalid_file.csv"), b"x".to_vec());
    mailbox.add_message(make_header("M2", "bss_episodes.json"), b"{}".to_vec());

    let stats = transfer
        .move_files_from_mesh_to_blob(
            &is_valid_bss_file,
            &original_file_name,
            &request(INBOUND, false),
        )
        .unwrap();

    assert_eq!(stats.messages_moved, 2);
    assert_eq!(stats.messages_poisoned, 2);
    assert!(dir.path().join(POISON).join("invalid_file.csv").exists());
    assert!(dir.path().join(POISON).join("bss_episodes.json").exists());
    assert!(!dir.path().join(INBOUND).exists());
    assert!(mailbox.is_empty());
}

#[test]
fn test_gzip_file_is_stored_decompressed() {
    let mailbox = Arc::new(InMemoryMailbox::new(MAILBOX));
    let (store, dir) = create_file_store();
    let transfer = MeshToBlobTransfer::new(mailbox.clone(), store.clone());

    let plain = b"nhs_number,subject_id\n9000000009,42\n";
    // The predicate sees the header name; the stored name drops the extension
    mailbox.add_message(make_header("M1", "bss_subjects.csv.gz"), gzip(plain));

    transfer
        .move_files_from_mesh_to_blob(&|_| true, &original_file_name, &request(INBOUND, false))
        .unwrap();

    assert_eq!(
        std::fs::read(dir.path().join(INBOUND).join("bss_subjects.csv")).unwrap(),
        plain
    );
}

#[test]
fn test_gzip_embedded_name_wins() {
    let mailbox = Arc::new(InMemoryMailbox::new(MAILBOX));
    let store = Arc::new(InMemoryBlobStore::new());
    let transfer = MeshToBlobTransfer::new(mailbox.clone(), store.clone());

    let mut encoder = GzBuilder::new()
        .filename("bss_episodes_20261018.csv")
        .write(Vec::new(), Compression::best());
    encoder.write_all(b"a,b\n").unwrap();
    mailbox.add_message(make_header("M1", "upload.gz"), encoder.finish().unwrap());

    transfer
        .move_files_from_mesh_to_blob(&|_| true, &original_file_name, &request(INBOUND, false))
        .unwrap();

    assert_eq!(store.list(INBOUND), vec!["bss_episodes_20261018.csv"]);
}

#[test]
fn test_corrupt_gzip_is_poisoned_with_message_prefix() {
    let mailbox = Arc::new(InMemoryMailbox::new(MAILBOX));
    let (store, dir) = create_file_store();
    let transfer = MeshToBlobTransfer::new(mailbox.clone(), store.clone());

    let mut corrupt = gzip(b"payload that will not survive");
    let len = corrupt.len();
    corrupt[10..len - 8].fill(0xFF);
    mailbox.add_message(make_header("M1", "bss_episodes.csv"), corrupt.clone());

    let stats = transfer
        .move_files_from_mesh_to_blob(
            &is_valid_bss_file,
            &original_file_name,
            &request(INBOUND, false),
        )
        .unwrap();

    assert_eq!(stats.messages_poisoned, 1);
    assert_eq!(
        std::fs::read(dir.path().join(POISON).join("M1_bss_episodes.csv")).unwrap(),
        corrupt
    );
    assert!(mailbox.is_empty());
}

#[test]
fn test_chunked_message_reassembled_in_order() {
    let mailbox = Arc::new(InMemoryMailbox::new(MAILBOX));
    let (store, _dir) = create_file_store();
    let transfer = MeshToBlobTransfer::new(mailbox.clone(), store.clone());

    // Pseudo-random bytes so the compressed form still spans several chunks
    let mut seed: u32 = 0x2545_F491;
    let body: Vec<u8> = (0..3000)
        .map(|_| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (seed >> 16) as u8
        })
        .collect();
    let compressed = gzip(&body);
    let chunks: Vec<Vec<u8>> = compressed.chunks(400).map(|c| c.to_vec()).collect();
    assert!(chunks.len() > 2);
    mailbox.add_chunked_message(make_header("M1", "bss_episodes.csv.gz"), chunks);

    transfer
        .move_files_from_mesh_to_blob(&|_| true, &original_file_name, &request(INBOUND, false))
        .unwrap();

    assert_eq!(
        store.download(INBOUND, "bss_episodes.csv").unwrap().unwrap(),
        body
    );
    assert_eq!(
        mailbox.count_calls(|c| matches!(c, MailboxCall::GetChunked(_))),
        1
    );
}

#[test]
fn test_report_messages_stay_in_mailbox() {
    let mailbox = Arc::new(InMemoryMailbox::new(MAILBOX));
    let store = Arc::new(InMemoryBlobStore::new());
    let transfer = MeshToBlobTransfer::new(mailbox.clone(), store.clone());

    let mut report = make_header("M1", "bss_episodes.csv");
    report.message_type = MessageType::Report;
    mailbox.add_message(report, Vec::new());

    let stats = transfer
        .move_files_from_mesh_to_blob(
            &is_valid_bss_file,
            &original_file_name,
            &request(INBOUND, false),
        )
        .unwrap();

    assert_eq!(stats.messages_skipped, 1);
    assert!(store.uploads().is_empty());
    assert!(mailbox.contains("M1"));
}

#[test]
fn test_failed_upload_is_retried_next_cycle() {
    let mailbox = Arc::new(InMemoryMailbox::new(MAILBOX));
    let store = Arc::new(InMemoryBlobStore::new());
    let transfer = MeshToBlobTransfer::new(mailbox.clone(), store.clone());

    mailbox.add_message(make_header("M1", "bss_episodes.csv"), b"a".to_vec());
    store.fail_container(INBOUND);

    let stats = transfer
        .move_files_from_mesh_to_blob(
            &is_valid_bss_file,
            &original_file_name,
            &request(INBOUND, false),
        )
        .unwrap();
    assert_eq!(stats.messages_moved, 0);
    assert!(mailbox.contains("M1"));

    store.heal();
    let stats = transfer
        .move_files_from_mesh_to_blob(
            &is_valid_bss_file,
            &original_file_name,
            &request(INBOUND, false),
        )
        .unwrap();
    assert_eq!(stats.messages_moved, 1);
    assert!(mailbox.is_empty());
    assert_eq!(store.list(INBOUND), vec!["bss_episodes.csv"]);
}

#[test]
fn test_redelivery_after_acknowledge_failure_overwrites() {
    let mailbox = Arc::new(InMemoryMailbox::new(MAILBOX));
    let (store, _dir) = create_file_store();
    let transfer = MeshToBlobTransfer::new(mailbox.clone(), store.clone());

    mailbox.add_message(make_header("M1", "bss_episodes.csv"), b"a".to_vec());
    mailbox.fail_acknowledge("M1");

    let first = transfer
        .move_files_from_mesh_to_blob(
            &is_valid_bss_file,
            &original_file_name,
            &request(INBOUND, false),
        )
        .unwrap();
    assert_eq!(first.acknowledge_failures, 1);

    // Same message again: the upload replaces the blob, no conflict
    let second = transfer
        .move_files_from_mesh_to_blob(
            &is_valid_bss_file,
            &original_file_name,
            &request(INBOUND, false),
        )
        .unwrap();
    assert_eq!(second.messages_moved, 1);
    assert_eq!(store.download(INBOUND, "bss_episodes.csv").unwrap().unwrap(), b"a");
}

#[test]
fn test_large_mailbox_drains_across_pages() {
    let mailbox = Arc::new(InMemoryMailbox::new(MAILBOX));
    let store = Arc::new(InMemoryBlobStore::new());
    let transfer = MeshToBlobTransfer::new(mailbox.clone(), store.clone());

    let total = MAX_INBOX_PAGE * 2 + 7;
    for i in 0..total {
        mailbox.add_message(
            make_header(&format!("M{:05}", i), &format!("bss_{:05}.csv", i)),
            b"x".to_vec(),
        );
    }

    let stats = transfer
        .move_files_from_mesh_to_blob(
            &is_valid_bss_file,
            &original_file_name,
            &request(INBOUND, false),
        )
        .unwrap();

    assert_eq!(stats.pages, 3);
    assert_eq!(stats.messages_moved, total);
    assert_eq!(store.list(INBOUND).len(), total);
    assert!(mailbox.is_empty());
}

#[test]
fn test_saturated_mailbox_stops_after_one_listing() {
    let mailbox = Arc::new(InMemoryMailbox::new(MAILBOX));
    let store = Arc::new(InMemoryBlobStore::new());
    let transfer = MeshToBlobTransfer::new(mailbox.clone(), store.clone());

    for i in 0..MAX_INBOX_PAGE {
        let id = format!("M{:04}", i);
        mailbox.add_message(make_header(&id, "bss_episodes.csv"), b"x".to_vec());
        mailbox.fail_header(&id);
    }

    let err = transfer
        .move_files_from_mesh_to_blob(
            &is_valid_bss_file,
            &original_file_name,
            &request(INBOUND, false),
        )
        .unwrap_err();

    assert!(matches!(err, TransferError::MailboxSaturated { .. }));
    assert_eq!(mailbox.count_calls(|c| *c == MailboxCall::List), 1);
}

#[test]
fn test_cycles_share_handshake_schedule() {
    let mailbox = Arc::new(InMemoryMailbox::new(MAILBOX));
    let (store, dir) = create_file_store();
    let transfer = MeshToBlobTransfer::new(mailbox.clone(), store.clone());
    let throttle = HandshakeThrottle::new(store.clone());

    mailbox.add_message(make_header("M1", "bss_episodes.csv"), b"a".to_vec());
    mailbox.add_message(make_header("M2", "invalid_file.csv"), b"b".to_vec());

    assert_eq!(run_cycle(&transfer, &throttle), (true, true));
    assert_eq!(mailbox.count_calls(|c| *c == MailboxCall::Handshake), 1);
    assert!(dir.path().join(STATE_CONTAINER).join(STATE_FILE_NAME).exists());
    assert!(dir.path().join(INBOUND).join("bss_episodes.csv").exists());
    assert!(dir.path().join(POISON).join("invalid_file.csv").exists());

    // A second throttle over the same store sees the stored schedule
    let other = HandshakeThrottle::new(store.clone());
    mailbox.add_message(make_header("M3", "bss_subjects.csv"), b"c".to_vec());
    assert_eq!(run_cycle(&transfer, &other), (true, true));
    assert_eq!(mailbox.count_calls(|c| *c == MailboxCall::Handshake), 1);
    assert!(mailbox.is_empty());
}

#[test]
fn test_handshake_failure_fails_only_the_first_pass() {
    let mailbox = Arc::new(InMemoryMailbox::new(MAILBOX));
    let store = Arc::new(InMemoryBlobStore::new());
    let transfer = MeshToBlobTransfer::new(mailbox.clone(), store.clone());
    let throttle = HandshakeThrottle::new(store.clone());

    mailbox.add_message(make_header("M1", "invalid_file.csv"), b"b".to_vec());
    mailbox.fail_handshake();

    assert_eq!(run_cycle(&transfer, &throttle), (false, true));
    assert_eq!(store.list(POISON), vec!["invalid_file.csv"]);
}
