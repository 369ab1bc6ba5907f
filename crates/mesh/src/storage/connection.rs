//! Blob storage connection strings
//!
//! Accepts the Azure storage connection string formats plus a local
//! directory form for development:
//! - `UseDevelopmentStorage=true` (Azurite on localhost)
//! - `DefaultEndpointsProtocol=https;AccountName=...;AccountKey=...;EndpointSuffix=...`
//! - `...;BlobEndpoint=http://host:port/account` (explicit endpoint)
//! - `file:/var/lib/meshbridge/blobs` (directory store)

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::{AzureBlobStore, BlobStore, FileBlobStore};

const AZURITE_ACCOUNT: &str = "devstoreaccount1";
const AZURITE_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const AZURITE_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// A parsed blob storage connection string
#[derive(Clone, PartialEq, Eq)]
pub enum BlobConnection {
    Azure {
        account: String,
        key: String,
        endpoint: String,
    },
    Directory(PathBuf),
}

impl fmt::Debug for BlobConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobConnection::Azure {
                account, endpoint, ..
            } => f
                .debug_struct("Azure")
                .field("account", account)
                .field("key", &"<redacted>")
                .field("endpoint", endpoint)
                .finish(),
            BlobConnection::Directory(path) => f.debug_tuple("Directory").field(path).finish(),
        }
    }
}

impl BlobConnection {
    /// Parse a connection string
    pub fn parse(connection_string: &str) -> Result<Self> {
        let trimmed = connection_string.trim();
        anyhow::ensure!(!trimmed.is_empty(), "Blob connection string is empty");

        if let Some(path) = trimmed.strip_prefix("file:") {
            anyhow::ensure!(!path.is_empty(), "Directory connection string has no path");
            return Ok(BlobConnection::Directory(PathBuf::from(path)));
        }

        let settings: HashMap<String, String> = trimmed
            .split(';')
            .filter(|part| !part.trim().is_empty())
            .filter_map(|part| {
                // Keys are case-insensitive; values (base64 keys) may contain '='
                part.split_once('=')
                    .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            })
            .collect();

        if settings
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Ok(BlobConnection::Azure {
                account: AZURITE_ACCOUNT.to_string(),
                key: AZURITE_KEY.to_string(),
                endpoint: settings
                    .get("blobendpoint")
                    .cloned()
                    .unwrap_or_else(|| AZURITE_BLOB_ENDPOINT.to_string()),
            });
        }

        let account = settings
            .get("accountname")
            .cloned()
            .context("Connection string missing AccountName")?;
        let key = settings
            .get("accountkey")
            .cloned()
            .context("Connection string missing AccountKey")?;

        let endpoint = match settings.get("blobendpoint") {
            Some(endpoint) => endpoint.clone(),
            None => {
                let protocol = settings
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                let suffix = settings
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or("core.windows.net");
                format!("{}://{}.blob.{}", protocol, account, suffix)
            }
        };

        Ok(BlobConnection::Azure {
            account,
            key,
            endpoint,
        })
    }

    /// Build the store this connection points at
    pub fn open(&self) -> Result<Arc<dyn BlobStore>> {
        Ok(match self {
            BlobConnection::Azure {
                account,
                key,
                endpoint,
            } => Arc::new(AzureBlobStore::new(account, key, endpoint)?),
            BlobConnection::Directory(path) => Arc::new(FileBlobStore::new(path)?),
        })
    }
}

/// Parse a connection string and open the matching store
pub fn open_blob_store(connection_string: &str) -> Result<Arc<dyn BlobStore>> {
    BlobConnection::parse(connection_string)?.open()
}
