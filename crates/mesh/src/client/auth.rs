//! MESH token authentication
//!
//! Every MESH request carries an `Authorization` header of the form
//! `NHSMESH {mailbox}:{nonce}:{nonce_count}:{timestamp}:{hmac}` where the
//! HMAC-SHA256 is keyed with the environment's shared key and covers
//! `{mailbox}:{nonce}:{nonce_count}:{password}:{timestamp}`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Secrets for a single mailbox
#[derive(Clone)]
pub struct MailboxCredentials {
    pub password: String,
    pub shared_key: String,
}

impl MailboxCredentials {
    pub fn new(password: impl Into<String>, shared_key: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            shared_key: shared_key.into(),
        }
    }
}

impl fmt::Debug for MailboxCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxCredentials")
            .field("password", &"<redacted>")
            .field("shared_key", &"<redacted>")
            .finish()
    }
}

/// Token generator for the mailboxes this client may use
#[derive(Debug, Clone, Default)]
pub struct MeshAuth {
    mailboxes: HashMap<String, MailboxCredentials>,
}

impl MeshAuth {
    /// Scheme prefix of the Authorization header
    const SCHEME: &'static str = "NHSMESH";

    pub fn new() -> Self {
        Self::default()
    }

    /// Register credentials for a mailbox
    pub fn add_mailbox(&mut self, mailbox_id: impl Into<String>, credentials: MailboxCredentials) {
        self.mailboxes.insert(mailbox_id.into(), credentials);
    }

    pub fn has_mailbox(&self, mailbox_id: &str) -> bool {
        self.mailboxes.contains_key(mailbox_id)
    }

    /// Build a fresh Authorization header value for a mailbox
    pub fn authorization_header(&self, mailbox_id: &str) -> Result<String> {
        let credentials = self
            .mailboxes
            .get(mailbox_id)
            .with_context(|| format!("No credentials configured for mailbox {}", mailbox_id))?;
        let nonce = uuid::Uuid::new_v4().to_string();
        build_token(mailbox_id, credentials, &nonce, 0, Utc::now())
    }
}

/// Build a token with explicit nonce and time
pub(crate) fn build_token(
    mailbox_id: &str,
    credentials: &MailboxCredentials,
    nonce: &str,
    nonce_count: u32,
    now: DateTime<Utc>,
) -> Result<String> {
    let timestamp = now.format("%Y%m%d%H%M").to_string();
    let message = format!(
        "{}:{}:{}:{}:{}",
        mailbox_id, nonce, nonce_count, credentials.password, timestamp
    );

    let mut mac = HmacSha256::new_from_slice(credentials.shared_key.as_bytes())
        .context("Invalid MESH shared key")?;
    mac.update(message.as_bytes());
    let hash = to_hex(&mac.finalize().into_bytes());

    Ok(format!(
        "{} {}:{}:{}:{}:{}",
        MeshAuth::SCHEME,
        mailbox_id,
        nonce,
        nonce_count,
        timestamp,
        hash
    ))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn creds() -> MailboxCredentials {
        MailboxCredentials::new("password", "TestKey")
    }

    #[test]
    fn test_token_format() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 5, 0).unwrap();
        let token = build_token("X26ABC1", &creds(), "nonce-1", 0, now).unwrap();

        let rest = token.strip_prefix("NHSMESH ").unwrap();
        let parts: Vec<&str> = rest.split(':').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], "X26ABC1");
        assert_eq!(parts[1], "nonce-1");
        assert_eq!(parts[2], "0");
        assert_eq!(parts[3], "202610180905");
        assert_eq!(parts[4].len(), 64);
        assert!(parts[4].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_token_hash_matches_hmac() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 0).unwrap();
        let token = build_token("X26ABC1", &creds(), "n", 1, now).unwrap();

        let mut mac = HmacSha256::new_from_slice(b"TestKey").unwrap();
        mac.update(b"X26ABC1:n:1:password:202601020304");
        let expected = to_hex(&mac.finalize().into_bytes());

        assert!(token.ends_with(&expected));
    }

    #[test]
    fn test_token_changes_with_password() {
        let now = Utc::now();
        let a = build_token("MB", &creds(), "n", 0, now).unwrap();
        let other = MailboxCredentials::new("other", "TestKey");
        let b = build_token("MB", &other, "n", 0, now).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unknown_mailbox() {
        let auth = MeshAuth::new();
        assert!(auth.authorization_header("MISSING").is_err());
    }

    #[test]
    fn test_authorization_header_uses_unique_nonce() {
        let mut auth = MeshAuth::new();
        auth.add_mailbox("MB", creds());
        let a = auth.authorization_header("MB").unwrap();
        let b = auth.authorization_header("MB").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = MailboxCredentials::new("s3cr3t-mesh-pass", "k3y-8f2a91");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("s3cr3t-mesh-pass"));
        assert!(!debug.contains("k3y-8f2a91"));
        assert!(debug.contains("<redacted>"));
    }
}
