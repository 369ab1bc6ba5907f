//! Retriever application state and tick logic

use anyhow::{Context, Result};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

use mesh::client::{MailboxClient, MailboxCredentials, MeshAuth, MeshClient};
use mesh::storage::{BlobStore, open_blob_store};
use mesh::transfer::{
    HandshakeThrottle, MeshToBlobTransfer, TransferError, TransferRequest, TransferStats,
    is_valid_bss_file, negate, original_file_name,
};
use mesh::RetrieverConfig;

/// Outcome of one timer tick
#[derive(Debug)]
pub struct TickReport {
    pub handshake: bool,
    pub valid_pass: Result<TransferStats, TransferError>,
    pub poison_pass: Result<TransferStats, TransferError>,
}

impl TickReport {
    pub fn is_success(&self) -> bool {
        self.valid_pass.is_ok() && self.poison_pass.is_ok()
    }
}

/// Main retriever state
pub struct RetrieverApp {
    config: RetrieverConfig,
    blobs: Arc<dyn BlobStore>,
    transfer: MeshToBlobTransfer,
    throttle: HandshakeThrottle,
}

impl RetrieverApp {
    /// Build the MESH client and blob store described by `config`
    pub fn new(config: RetrieverConfig) -> Result<Self> {
        let mut auth = MeshAuth::new();
        auth.add_mailbox(
            config.mailbox_id.clone(),
            MailboxCredentials::new(config.mesh_password.clone(), config.mesh_shared_key.clone()),
        );
        let mailbox: Arc<dyn MailboxClient> = Arc::new(
            MeshClient::new(&config.mesh_api_base_url, auth)
                .context("Failed to create MESH client")?,
        );
        let blobs = open_blob_store(&config.blob_connection_string)
            .context("Failed to open blob storage")?;

        Ok(Self::with_clients(config, mailbox, blobs))
    }

    /// Assemble the app from already constructed clients
    pub fn with_clients(
        config: RetrieverConfig,
        mailbox: Arc<dyn MailboxClient>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let transfer = MeshToBlobTransfer::new(mailbox, blobs.clone());
        let throttle = HandshakeThrottle::new(blobs.clone());
        Self {
            config,
            blobs,
            transfer,
            throttle,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.poll_interval_secs)
    }

    /// Create the destination, poison and state containers if missing
    pub fn ensure_containers(&self) -> Result<()> {
        for container in [
            self.config.destination_container.as_str(),
            self.config.poison_container.as_str(),
            self.throttle.container(),
        ] {
            self.blobs
                .ensure_container(container)
                .with_context(|| format!("Failed to create container {}", container))?;
        }
        Ok(())
    }

    /// One cycle: decide on a handshake, then a pass for valid files and
    /// a pass that moves everything else to the poison container
    pub fn run_tick(&self) -> TickReport {
        let handshake = self.throttle.should_handshake();

        let valid_request = TransferRequest {
            mailbox_id: self.config.mailbox_id.clone(),
            destination_container: self.config.destination_container.clone(),
            poison_container: self.config.poison_container.clone(),
            execute_handshake: handshake,
        };
        let valid_pass = self.transfer.move_files_from_mesh_to_blob(
            &is_valid_bss_file,
            &original_file_name,
            &valid_request,
        );
        log_pass("valid", &valid_pass);

        let poison_request = TransferRequest {
            destination_container: self.config.poison_container.clone(),
            execute_handshake: false,
            ..valid_request
        };
        let poison_pass = self.transfer.move_files_from_mesh_to_blob(
            &negate(is_valid_bss_file),
            &original_file_name,
            &poison_request,
        );
        log_pass("poison", &poison_pass);

        TickReport {
            handshake,
            valid_pass,
            poison_pass,
        }
    }
}

fn log_pass(pass: &str, result: &Result<TransferStats, TransferError>) {
    match result {
        Ok(stats) => info!(
            "{} pass complete: {} found, {} moved, {} skipped in {}ms",
            pass,
            stats.messages_found,
            stats.messages_moved,
            stats.messages_skipped,
            stats.duration_ms
        ),
        Err(e) => error!(
            "An error was encountered while moving files from MESH to blob ({} pass): {}",
            pass, e
        ),
    }
}
