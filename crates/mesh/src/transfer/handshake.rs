//! Handshake scheduling
//!
//! MESH expects a handshake at least once a day. The next due time is kept
//! in a small JSON blob so that every instance of the retriever shares it.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::models::{BlobFile, HandshakeState};
use crate::storage::BlobStore;

/// Container holding the handshake state
pub const STATE_CONTAINER: &str = "config";

/// Blob holding the handshake state
pub const STATE_FILE_NAME: &str = "MeshState.json";

/// Decides whether the current cycle should handshake with the mailbox
pub struct HandshakeThrottle {
    store: Arc<dyn BlobStore>,
    container: String,
    file_name: String,
}

impl HandshakeThrottle {
    /// Throttle backed by `config/MeshState.json`
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self::with_location(store, STATE_CONTAINER, STATE_FILE_NAME)
    }

    pub fn with_location(
        store: Arc<dyn BlobStore>,
        container: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            container: container.into(),
            file_name: file_name.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn should_handshake(&self) -> bool {
        self.should_handshake_at(Utc::now())
    }

    /// Check the stored schedule against `now`.
    ///
    /// Whenever this returns true the schedule is moved one interval past
    /// `now`. State store failures never stop the cycle.
    pub fn should_handshake_at(&self, now: DateTime<Utc>) -> bool {
        let stored = match self.store.download(&self.container, &self.file_name) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(
                    "Failed to read handshake state {}/{}: {:#}",
                    self.container, self.file_name, e
                );
                None
            }
        };

        let Some(bytes) = stored else {
            info!("No handshake state found, scheduling from now");
            self.schedule_next(now);
            return true;
        };

        match HandshakeState::from_json(&bytes) {
            None => {
                warn!(
                    "Handshake state {}/{} is invalid, rewriting it",
                    self.container, self.file_name
                );
                self.schedule_next(now);
                true
            }
            Some(state) if state.is_due(now) => {
                info!(
                    "Handshake due (scheduled for {})",
                    state.next_handshake_time.to_rfc3339()
                );
                self.schedule_next(now);
                true
            }
            Some(state) => {
                debug!(
                    "Next handshake at {}",
                    state.next_handshake_time.to_rfc3339()
                );
                false
            }
        }
    }

    fn schedule_next(&self, now: DateTime<Utc>) {
        let state = HandshakeState::scheduled_from(now);
        let content = match state.to_json() {
            Ok(content) => content,
            Err(e) => {
                error!("Failed to serialize handshake state: {}", e);
                return;
            }
        };

        let file = BlobFile::new(content, self.file_name.as_str());
        if let Err(e) = self.store.upload(&self.container, &file, true) {
            error!(
                "Failed to write handshake state {}/{}: {:#}",
                self.container, self.file_name, e
            );
        }
    }
}
