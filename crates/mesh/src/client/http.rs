//! MESH API HTTP client
//!
//! Implements [`MailboxClient`] against the MESH API v2.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use log::debug;
use std::time::Duration;
use ureq::http::Response;
use ureq::{Agent, Body};
use url::Url;

use super::api::{CheckInboxResponse, ErrorResponse, HandshakeResponse};
use super::headers::{MEX_CHUNK_RANGE, header, parse_chunk_range, parse_message_headers};
use super::{MAX_CHUNKS, MailboxClient, MeshAuth, MeshError, MeshResult};
use crate::models::{MessageId, MessageMetadata};

/// MESH API client for a set of mailboxes sharing one environment
pub struct MeshClient {
    base_url: String,
    auth: MeshAuth,
    agent: Agent,
}

impl MeshClient {
    /// Media type selecting the v2 API
    const ACCEPT: &'static str = "application/vnd.mesh.v2+json";

    /// MESH caps a single chunk at 100MB
    const MAX_CHUNK_BYTES: u64 = 100 * 1024 * 1024;

    /// Create a new MESH client
    ///
    /// # Arguments
    /// * `base_url` - Environment root, e.g. `https://msg.intspineservices.nhs.uk`
    /// * `auth` - Credentials for every mailbox this client will use
    pub fn new(base_url: &str, auth: MeshAuth) -> Result<Self> {
        Self::with_timeout(base_url, auth, None)
    }

    /// Create a client with an overall per-request timeout
    pub fn with_timeout(base_url: &str, auth: MeshAuth, timeout: Option<Duration>) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .with_context(|| format!("Invalid MESH API base URL: {}", base_url))?;
        anyhow::ensure!(
            matches!(parsed.scheme(), "http" | "https"),
            "MESH API base URL must be http(s): {}",
            base_url
        );

        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build();

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            agent: Agent::new_with_config(config),
        })
    }

    fn mailbox_url(&self, mailbox_id: &str) -> String {
        format!(
            "{}/messageexchange/{}",
            self.base_url,
            urlencoding::encode(mailbox_id)
        )
    }

    fn message_url(&self, mailbox_id: &str, message_id: &MessageId) -> String {
        format!(
            "{}/inbox/{}",
            self.mailbox_url(mailbox_id),
            urlencoding::encode(message_id.as_str())
        )
    }

    fn token(&self, mailbox_id: &str) -> MeshResult<String> {
        self.auth
            .authorization_header(mailbox_id)
            .map_err(|e| MeshError::new("AUTH", e.to_string()))
    }

    /// Turn a non-2xx response into a MeshError carrying the mailbox's reason
    fn check(mut response: Response<Body>, action: &str) -> MeshResult<Response<Body>> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: ErrorResponse = response.body_mut().read_json().unwrap_or_default();
        let description = body
            .description()
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
        let code = body
            .code()
            .map(|c| format!("{} ({})", status.as_u16(), c))
            .unwrap_or_else(|| status.as_u16().to_string());

        Err(MeshError::new(code, format!("{}: {}", action, description)))
    }

    fn read_bytes(response: &mut Response<Body>, action: &str) -> MeshResult<Vec<u8>> {
        response
            .body_mut()
            .with_config()
            .limit(Self::MAX_CHUNK_BYTES)
            .read_to_vec()
            .map_err(|e| MeshError::transport(format!("{}: {}", action, e)))
    }

    /// GET one chunk (or the whole body when `chunk` is None)
    fn fetch(
        &self,
        mailbox_id: &str,
        message_id: &MessageId,
        chunk: Option<u32>,
    ) -> MeshResult<Response<Body>> {
        let url = match chunk {
            Some(n) if n > 1 => format!("{}/{}", self.message_url(mailbox_id, message_id), n),
            _ => self.message_url(mailbox_id, message_id),
        };
        let token = self.token(mailbox_id)?;

        let response = self
            .agent
            .get(&url)
            .header("Authorization", &token)
            .header("Accept", Self::ACCEPT)
            .header("Accept-Encoding", "gzip")
            .call()
            .map_err(|e| {
                MeshError::transport(format!("Failed to send get message request: {}", e))
            })?;

        Self::check(response, "get message")
    }
}

impl MailboxClient for MeshClient {
    fn handshake(&self, mailbox_id: &str) -> MeshResult<()> {
        let token = self.token(mailbox_id)?;

        let response = self
            .agent
            .post(&self.mailbox_url(mailbox_id))
            .header("Authorization", &token)
            .header("Accept", Self::ACCEPT)
            .header(
                "mex-clientversion",
                concat!("meshbridge/", env!("CARGO_PKG_VERSION")),
            )
            .header("mex-osname", std::env::consts::OS)
            .header("mex-osarchitecture", std::env::consts::ARCH)
            .send_empty()
            .map_err(|e| MeshError::transport(format!("Failed to send handshake request: {}", e)))?;

        let mut response = Self::check(response, "handshake")?;
        let body: HandshakeResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| {
                MeshError::transport(format!("Failed to parse handshake response: {}", e))
            })?;
        debug!("Handshake accepted for mailbox {}", body.mailbox_id);
        Ok(())
    }

    fn list_messages(&self, mailbox_id: &str) -> MeshResult<Vec<MessageId>> {
        let token = self.token(mailbox_id)?;
        let url = format!("{}/inbox", self.mailbox_url(mailbox_id));

        let response = self
            .agent
            .get(&url)
            .header("Authorization", &token)
            .header("Accept", Self::ACCEPT)
            .call()
            .map_err(|e| {
                MeshError::transport(format!("Failed to send check inbox request: {}", e))
            })?;

        let mut response = Self::check(response, "check inbox")?;
        let inbox: CheckInboxResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| MeshError::transport(format!("Failed to parse inbox response: {}", e)))?;

        Ok(inbox.messages.into_iter().map(MessageId::new).collect())
    }

    fn get_header(&self, mailbox_id: &str, message_id: &MessageId) -> MeshResult<MessageMetadata> {
        let token = self.token(mailbox_id)?;

        let response = self
            .agent
            .head(&self.message_url(mailbox_id, message_id))
            .header("Authorization", &token)
            .header("Accept", Self::ACCEPT)
            .call()
            .map_err(|e| {
                MeshError::transport(format!("Failed to send head message request: {}", e))
            })?;

        let response = Self::check(response, "head message")?;
        Ok(parse_message_headers(message_id, response.headers()))
    }

    fn get_message(&self, mailbox_id: &str, message_id: &MessageId) -> MeshResult<Vec<u8>> {
        let mut response = self.fetch(mailbox_id, message_id, None)?;
        Self::read_bytes(&mut response, "read message body")
    }

    fn get_chunked_message(
        &self,
        mailbox_id: &str,
        message_id: &MessageId,
        total_chunks: u32,
    ) -> MeshResult<Vec<Vec<u8>>> {
        if total_chunks == 0 || total_chunks > MAX_CHUNKS {
            return Err(MeshError::new(
                "CHUNK_RANGE",
                format!(
                    "Message {} reports {} chunks (expected 1..={})",
                    message_id, total_chunks, MAX_CHUNKS
                ),
            ));
        }

        let mut first = self.fetch(mailbox_id, message_id, Some(1))?;
        if let Some(range) = header(first.headers(), MEX_CHUNK_RANGE) {
            let reported = parse_chunk_range(&range);
            if reported != Some(total_chunks) {
                return Err(MeshError::new(
                    "CHUNK_RANGE",
                    format!(
                        "Chunk range {:?} for message {} does not match header total {}",
                        range, message_id, total_chunks
                    ),
                ));
            }
        }

        let mut chunks = Vec::new();
        chunks.push(Self::read_bytes(&mut first, "read chunk 1")?);

        for n in 2..=total_chunks {
            debug!(
                "Downloading chunk {}/{} of message {}",
                n, total_chunks, message_id
            );
            let mut response = self.fetch(mailbox_id, message_id, Some(n))?;
            chunks.push(Self::read_bytes(&mut response, &format!("read chunk {}", n))?);
        }

        Ok(chunks)
    }

    fn acknowledge(&self, mailbox_id: &str, message_id: &MessageId) -> MeshResult<()> {
        let token = self.token(mailbox_id)?;
        let url = format!(
            "{}/status/acknowledged",
            self.message_url(mailbox_id, message_id)
        );

        let response = self
            .agent
            .put(&url)
            .header("Authorization", &token)
            .header("Accept", Self::ACCEPT)
            .send_empty()
            .map_err(|e| {
                MeshError::transport(format!("Failed to send acknowledge request: {}", e))
            })?;

        Self::check(response, "acknowledge").map(|_| ())
    }
}
