//! Configuration loading for the mailbox retriever
//!
//! Supports loading settings from (in order of priority):
//! 1. An explicit JSON file (`--config`)
//! 2. JSON file in the config directory (~/.config/meshbridge/retriever.json)
//! 3. Environment variables (fallback)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::storage::validate_container_name;

/// Settings filename in the meshbridge config directory
const CONFIG_FILE: &str = "retriever.json";

const DEFAULT_DESTINATION_CONTAINER: &str = "inbound";
const DEFAULT_POISON_CONTAINER: &str = "inbound-poison";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Everything the retriever needs to drain one mailbox
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// Base URL of the MESH API, e.g. `https://msg.intspineservices.nhs.uk`
    pub mesh_api_base_url: String,
    pub mailbox_id: String,
    pub mesh_password: String,
    pub mesh_shared_key: String,
    /// Azure storage connection string, or `file:<dir>` for a local store
    pub blob_connection_string: String,
    #[serde(default = "default_destination_container")]
    pub destination_container: String,
    #[serde(default = "default_poison_container")]
    pub poison_container: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_destination_container() -> String {
    DEFAULT_DESTINATION_CONTAINER.to_string()
}

fn default_poison_container() -> String {
    DEFAULT_POISON_CONTAINER.to_string()
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl fmt::Debug for RetrieverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrieverConfig")
            .field("mesh_api_base_url", &self.mesh_api_base_url)
            .field("mailbox_id", &self.mailbox_id)
            .field("mesh_password", &"<redacted>")
            .field("mesh_shared_key", &"<redacted>")
            .field("blob_connection_string", &"<redacted>")
            .field("destination_container", &self.destination_container)
            .field("poison_container", &self.poison_container)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .finish()
    }
}

impl RetrieverConfig {
    /// Load settings using the following priority:
    /// 1. `path`, when given
    /// 2. JSON file (~/.config/meshbridge/retriever.json)
    /// 3. Environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = if let Some(path) = path {
            Self::from_file(path)?
        } else if config::config_exists(CONFIG_FILE) {
            config::load_json(CONFIG_FILE)?
        } else {
            Self::from_env()?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse retriever config JSON")
    }

    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            mesh_api_base_url: config::require_env("MESH_API_BASE_URL")?,
            mailbox_id: config::require_env("BSS_MAILBOX")?,
            mesh_password: config::require_env("MESH_PASSWORD")?,
            mesh_shared_key: config::require_env("MESH_SHARED_KEY")?,
            blob_connection_string: config::require_env("BLOB_CONNECTION_STRING")?,
            destination_container: config::optional_env("BSS_CONTAINER_NAME")
                .unwrap_or_else(default_destination_container),
            poison_container: config::optional_env("POISON_CONTAINER_NAME")
                .unwrap_or_else(default_poison_container),
            poll_interval_secs: config::parse_env("POLL_INTERVAL_SECS")?
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        })
    }

    /// Reject settings that can never work
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("mesh_api_base_url", &self.mesh_api_base_url),
            ("mailbox_id", &self.mailbox_id),
            ("mesh_password", &self.mesh_password),
            ("mesh_shared_key", &self.mesh_shared_key),
            ("blob_connection_string", &self.blob_connection_string),
        ] {
            anyhow::ensure!(!value.trim().is_empty(), "{} must not be empty", name);
        }

        validate_container_name(&self.destination_container)
            .context("Invalid destination container")?;
        validate_container_name(&self.poison_container).context("Invalid poison container")?;
        anyhow::ensure!(
            self.destination_container != self.poison_container,
            "Destination and poison containers must differ"
        );
        anyhow::ensure!(
            self.poll_interval_secs > 0,
            "poll_interval_secs must be greater than zero"
        );
        Ok(())
    }

    /// Get the default settings file path (~/.config/meshbridge/retriever.json)
    pub fn default_config_path() -> Option<PathBuf> {
        config::config_path(CONFIG_FILE)
    }
}
