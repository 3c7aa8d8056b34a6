//! Signed presence announcements.
//!
//! Broadcast on the well-known presence topic every 30 seconds. The
//! signature covers the canonical JSON of the first four fields
//! (`pubKey`, `nickname`, `timestamp`, `channels`).

use ordernet_types::{OrdernetError, Result};

use ordernet_crypto::signing::{self, Keypair, PublicKey, Signature};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PresenceAnnouncement
// ---------------------------------------------------------------------------

/// Wire form of a presence announcement:
/// `{pubKey, nickname, timestamp, channels, signature}`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PresenceAnnouncement {
    /// Announcing node's Ed25519 public key.
    pub pub_key: PublicKey,
    /// Current nickname.
    pub nickname: String,
    /// Announcement time, milliseconds since epoch.
    pub timestamp: i64,
    /// Channel ids the node currently participates in.
    pub channels: Vec<String>,
    /// Ed25519 signature over the canonical payload.
    pub signature: Signature,
}

/// The signed portion of an announcement (everything but the
/// signature), in the same canonical field order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PresencePayload<'a> {
    pub_key: &'a PublicKey,
    nickname: &'a str,
    timestamp: i64,
    channels: &'a [String],
}

impl PresenceAnnouncement {
    /// Builds and signs an announcement.
    pub fn build(
        keypair: &Keypair,
        nickname: &str,
        timestamp: i64,
        channels: Vec<String>,
    ) -> Result<Self> {
        let pub_key = keypair.public_key();
        let payload_bytes = payload_bytes(&pub_key, nickname, timestamp, &channels)?;
        let signature = keypair.sign(&payload_bytes);

        Ok(Self {
            pub_key,
            nickname: nickname.to_string(),
            timestamp,
            channels,
            signature,
        })
    }

    /// Verifies the announcement's signature against its own pubkey.
    pub fn verify(&self) -> Result<()> {
        let bytes = payload_bytes(&self.pub_key, &self.nickname, self.timestamp, &self.channels)?;
        signing::verify(&self.pub_key, &bytes, &self.signature)
    }

    /// Serializes to canonical JSON wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| OrdernetError::MalformedEnvelope {
            reason: format!("presence serialization failed: {e}"),
        })
    }

    /// Deserializes from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| OrdernetError::MalformedEnvelope {
            reason: format!("presence parse failed: {e}"),
        })
    }
}

/// Canonical bytes of the signed payload.
fn payload_bytes(
    pub_key: &PublicKey,
    nickname: &str,
    timestamp: i64,
    channels: &[String],
) -> Result<Vec<u8>> {
    serde_json::to_vec(&PresencePayload {
        pub_key,
        nickname,
        timestamp,
        channels,
    })
    .map_err(|e| OrdernetError::MalformedEnvelope {
        reason: format!("presence payload serialization failed: {e}"),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
