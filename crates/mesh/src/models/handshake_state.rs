//! Persisted handshake schedule for a MESH mailbox

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// How long to wait between handshakes.
///
/// MESH requires a handshake at least once every 24 hours; six minutes of
/// margin keeps a five-minute timer from drifting past the limit.
pub const HANDSHAKE_INTERVAL: Duration = Duration::minutes(23 * 60 + 54);

/// Stored as `{"NextHandShakeTime": "..."}` in the config container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeState {
    #[serde(rename = "NextHandShakeTime")]
    pub next_handshake_time: DateTime<Utc>,
}

impl HandshakeState {
    /// State scheduling the next handshake one interval after `now`
    pub fn scheduled_from(now: DateTime<Utc>) -> Self {
        Self {
            next_handshake_time: now + HANDSHAKE_INTERVAL,
        }
    }

    /// Whether a handshake is due at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_handshake_time <= now
    }

    /// Parse a stored state blob.
    ///
    /// Returns None when the JSON is malformed, the key is missing or the
    /// value is not a timestamp. Offset-less timestamps are read as UTC.
    pub fn from_json(bytes: &[u8]) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
        let raw = value.get("NextHandShakeTime")?.as_str()?;
        parse_timestamp(raw).map(|next_handshake_time| Self {
            next_handshake_time,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
