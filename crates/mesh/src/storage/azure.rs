//! Azure Blob Storage over REST
//!
//! Requests are signed with the storage account's shared key.
//! Uses synchronous HTTP (ureq) like the MESH client. Works against both
//! Azure (`https://{account}.blob.core.windows.net`) and Azurite
//! (`http://127.0.0.1:10000/devstoreaccount1`).

use anyhow::{Context, Result};
use base64::prelude::*;
use chrono::Utc;
use hmac::{Hmac, Mac};
use log::debug;
use sha2::Sha256;
use std::collections::BTreeMap;
use ureq::Agent;
use url::Url;

use super::blob::{BlobExistsError, BlobStore, validate_blob_name, validate_container_name};
use crate::models::BlobFile;

type HmacSha256 = Hmac<Sha256>;

/// Blob store backed by an Azure storage account
pub struct AzureBlobStore {
    account: String,
    key: Vec<u8>,
    endpoint: Url,
    agent: Agent,
}

/// Parts of a request that feed the SharedKey signature
struct SignedRequest<'a> {
    verb: &'a str,
    content_length: usize,
    content_type: &'a str,
    if_none_match: &'a str,
    ms_headers: BTreeMap<&'a str, String>,
    path: String,
    query: &'a [(&'a str, &'a str)],
}

impl AzureBlobStore {
    const API_VERSION: &'static str = "2021-08-06";

    /// Largest blob we'll read back into memory
    const MAX_DOWNLOAD_BYTES: u64 = 512 * 1024 * 1024;

    /// Create a store for an account
    ///
    /// # Arguments
    /// * `account` - Storage account name
    /// * `key` - Base64 account key from the connection string
    /// * `endpoint` - Blob service endpoint, including the account path for Azurite
    pub fn new(account: &str, key: &str, endpoint: &str) -> Result<Self> {
        let key = BASE64_STANDARD
            .decode(key.trim())
            .context("Storage account key is not valid base64")?;
        let endpoint = Url::parse(endpoint.trim_end_matches('/'))
            .with_context(|| format!("Invalid blob endpoint: {}", endpoint))?;

        let config = Agent::config_builder().http_status_as_error(false).build();

        Ok(Self {
            account: account.to_string(),
            key,
            endpoint,
            agent: Agent::new_with_config(config),
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// URL path for a container or blob, with blob segments percent-encoded
    fn resource_path(&self, container: &str, file_name: Option<&str>) -> String {
        let base = self.endpoint.path().trim_end_matches('/');
        match file_name {
            Some(name) => {
                let encoded: Vec<String> = name
                    .split('/')
                    .map(|segment| urlencoding::encode(segment).into_owned())
                    .collect();
                format!("{}/{}/{}", base, container, encoded.join("/"))
            }
            None => format!("{}/{}", base, container),
        }
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}://{}{}",
            self.endpoint.scheme(),
            self.endpoint
                .host_str()
                .map(|h| match self.endpoint.port() {
                    Some(port) => format!("{}:{}", h, port),
                    None => h.to_string(),
                })
                .unwrap_or_default(),
            path
        );
        if !query.is_empty() {
            let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            url.push('?');
            url.push_str(&pairs.join("&"));
        }
        url
    }

    fn authorization(&self, request: &SignedRequest<'_>) -> Result<String> {
        let string_to_sign = string_to_sign(&self.account, request);
        let mut mac = HmacSha256::new_from_slice(&self.key).context("Invalid storage account key")?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());
        Ok(format!("SharedKey {}:{}", self.account, signature))
    }

    fn base_headers() -> BTreeMap<&'static str, String> {
        let mut headers = BTreeMap::new();
        headers.insert(
            "x-ms-date",
            Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        );
        headers.insert("x-ms-version", Self::API_VERSION.to_string());
        headers
    }

    /// Issue a body-less request (GET, HEAD, DELETE) and return the response
    fn send_without_body(
        &self,
        verb: &'static str,
        container: &str,
        file_name: &str,
    ) -> Result<ureq::http::Response<ureq::Body>> {
        validate_container_name(container)?;
        validate_blob_name(file_name)?;

        let request = SignedRequest {
            verb,
            content_length: 0,
            content_type: "",
            if_none_match: "",
            ms_headers: Self::base_headers(),
            path: self.resource_path(container, Some(file_name)),
            query: &[],
        };
        let auth = self.authorization(&request)?;
        let url = self.url(&request.path, request.query);

        let builder = match verb {
            "GET" => self.agent.get(&url),
            "HEAD" => self.agent.head(&url),
            "DELETE" => self.agent.delete(&url),
            other => anyhow::bail!("Unsupported verb {}", other),
        };
        let mut builder = builder.header("Authorization", &auth);
        for (name, value) in &request.ms_headers {
            builder = builder.header(*name, value);
        }

        builder
            .call()
            .with_context(|| {
                format!(
                    "Failed to send {} request for {}/{}",
                    verb, container, file_name
                )
            })
    }
}

impl BlobStore for AzureBlobStore {
    fn upload(&self, container: &str, file: &BlobFile, overwrite: bool) -> Result<()> {
        validate_container_name(container)?;
        validate_blob_name(&file.file_name)?;

        let mut ms_headers = Self::base_headers();
        ms_headers.insert("x-ms-blob-type", "BlockBlob".to_string());

        let request = SignedRequest {
            verb: "PUT",
            content_length: file.content.len(),
            content_type: "application/octet-stream",
            if_none_match: if overwrite { "" } else { "*" },
            ms_headers,
            path: self.resource_path(container, Some(&file.file_name)),
            query: &[],
        };
        let auth = self.authorization(&request)?;

        let mut builder = self
            .agent
            .put(&self.url(&request.path, request.query))
            .header("Authorization", &auth)
            .header("Content-Type", request.content_type);
        for (name, value) in &request.ms_headers {
            builder = builder.header(*name, value);
        }
        if !overwrite {
            builder = builder.header("If-None-Match", "*");
        }

        let response = builder
            .send(file.content.as_slice())
            .with_context(|| format!("Failed to upload {}/{}", container, file.file_name))?;

        match response.status().as_u16() {
            200..=299 => {
                debug!("Uploaded {} bytes to {}/{}", file.len(), container, file.file_name);
                Ok(())
            }
            409 | 412 => Err(BlobExistsError {
                container: container.to_string(),
                file_name: file.file_name.clone(),
            }
            .into()),
            status => anyhow::bail!(
                "Upload of {}/{} failed with status {}",
                container,
                file.file_name,
                status
            ),
        }
    }

    fn download(&self, container: &str, file_name: &str) -> Result<Option<Vec<u8>>> {
        let mut response = self.send_without_body("GET", container, file_name)?;
        match response.status().as_u16() {
            200..=299 => {
                let content = response
                    .body_mut()
                    .with_config()
                    .limit(Self::MAX_DOWNLOAD_BYTES)
                    .read_to_vec()
                    .with_context(|| format!("Failed to read {}/{}", container, file_name))?;
                Ok(Some(content))
            }
            404 => Ok(None),
            status => anyhow::bail!(
                "Download of {}/{} failed with status {}",
                container,
                file_name,
                status
            ),
        }
    }

    fn exists(&self, container: &str, file_name: &str) -> Result<bool> {
        let response = self.send_without_body("HEAD", container, file_name)?;
        match response.status().as_u16() {
            200..=299 => Ok(true),
            404 => Ok(false),
            status => anyhow::bail!(
                "HEAD {}/{} failed with status {}",
                container,
                file_name,
                status
            ),
        }
    }

    fn delete(&self, container: &str, file_name: &str) -> Result<()> {
        let response = self.send_without_body("DELETE", container, file_name)?;
        match response.status().as_u16() {
            200..=299 | 404 => Ok(()),
            status => anyhow::bail!(
                "Delete of {}/{} failed with status {}",
                container,
                file_name,
                status
            ),
        }
    }

    fn ensure_container(&self, container: &str) -> Result<()> {
        validate_container_name(container)?;

        let query: &[(&str, &str)] = &[("restype", "container")];
        let request = SignedRequest {
            verb: "PUT",
            content_length: 0,
            content_type: "",
            if_none_match: "",
            ms_headers: Self::base_headers(),
            path: self.resource_path(container, None),
            query,
        };
        let auth = self.authorization(&request)?;

        let mut builder = self
            .agent
            .put(&self.url(&request.path, request.query))
            .header("Authorization", &auth);
        for (name, value) in &request.ms_headers {
            builder = builder.header(*name, value);
        }

        let response = builder
            .send_empty()
            .with_context(|| format!("Failed to create container {}", container))?;

        match response.status().as_u16() {
            200..=299 => {
                debug!("Created container {}", container);
                Ok(())
            }
            409 => Ok(()),
            status => anyhow::bail!("Create container {} failed with status {}", container, status),
        }
    }
}

/// Build the SharedKey string-to-sign for the Blob service
fn string_to_sign(account: &str, request: &SignedRequest<'_>) -> String {
    let content_length = if request.content_length == 0 {
        String::new()
    } else {
        request.content_length.to_string()
    };

    let fields = [
        request.verb,
        "", // Content-Encoding
        "", // Content-Language
        content_length.as_str(),
        "", // Content-MD5
        request.content_type,
        "", // Date (x-ms-date is used instead)
        "", // If-Modified-Since
        "", // If-Match
        request.if_none_match,
        "", // If-Unmodified-Since
        "", // Range
    ];
    let mut out = fields.join("\n");
    out.push('\n');

    // BTreeMap keeps the x-ms-* headers sorted
    for (name, value) in &request.ms_headers {
        out.push_str(&format!("{}:{}\n", name, value.trim()));
    }

    out.push_str(&format!("/{}{}", account, request.path));
    let mut query: Vec<&(&str, &str)> = request.query.iter().collect();
    query.sort();
    for (name, value) in query {
        out.push_str(&format!("\n{}:{}", name.to_ascii_lowercase(), value));
    }
    out
}
