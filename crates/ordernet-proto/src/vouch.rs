//! Join requests and vouches.
//!
//! Both travel over the `/ordernet/vouch/1.0.0` unicast protocol as a
//! JSON envelope discriminated by a `"type"` field. A vouch is a signed
//! attestation `(voucher, vouchee, channel)`; the signature covers the
//! canonical JSON of the first four fields.

use ordernet_types::{OrdernetError, Result};

use ordernet_crypto::signing::{self, Keypair, PublicKey, Signature};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Vouch
// ---------------------------------------------------------------------------

/// A signed attestation that `voucher` vouches for `vouchee` on a
/// channel. One vouch per `(voucher, vouchee, channel)` — the store's
/// composite primary key makes re-vouching a no-op.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vouch {
    /// Lowercase hex is used at rest; on the wire this is the raw key.
    pub voucher_pub_key: PublicKey,
    /// The peer being vouched for.
    pub vouchee_pub_key: PublicKey,
    /// Target channel id.
    pub channel_id: String,
    /// Vouch time, milliseconds since epoch.
    pub timestamp: i64,
    /// Ed25519 signature over the canonical payload.
    pub signature: Signature,
}

/// The signed portion of a vouch, in canonical field order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VouchPayload<'a> {
    voucher_pub_key: &'a PublicKey,
    vouchee_pub_key: &'a PublicKey,
    channel_id: &'a str,
    timestamp: i64,
}

impl Vouch {
    /// Creates and signs a vouch.
    pub fn create(
        keypair: &Keypair,
        vouchee: PublicKey,
        channel_id: &str,
        timestamp: i64,
    ) -> Result<Self> {
        let voucher = keypair.public_key();
        let bytes = payload_bytes(&voucher, &vouchee, channel_id, timestamp)?;
        let signature = keypair.sign(&bytes);

        Ok(Self {
            voucher_pub_key: voucher,
            vouchee_pub_key: vouchee,
            channel_id: channel_id.to_string(),
            timestamp,
            signature,
        })
    }

    /// Verifies the signature by reconstructing the identical canonical
    /// payload.
    pub fn verify(&self) -> Result<()> {
        let bytes = payload_bytes(
            &self.voucher_pub_key,
            &self.vouchee_pub_key,
            &self.channel_id,
            self.timestamp,
        )?;
        signing::verify(&self.voucher_pub_key, &bytes, &self.signature)
    }
}

/// Canonical bytes of the signed payload.
fn payload_bytes(
    voucher: &PublicKey,
    vouchee: &PublicKey,
    channel_id: &str,
    timestamp: i64,
) -> Result<Vec<u8>> {
    serde_json::to_vec(&VouchPayload {
        voucher_pub_key: voucher,
        vouchee_pub_key: vouchee,
        channel_id,
        timestamp,
    })
    .map_err(|e| OrdernetError::MalformedEnvelope {
        reason: format!("vouch payload serialization failed: {e}"),
    })
}

// ---------------------------------------------------------------------------
// VouchMessage
// ---------------------------------------------------------------------------

/// Unicast envelope of the vouch protocol, discriminated by `"type"`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VouchMessage {
    /// A peer asks to join a channel.
    #[serde(rename_all = "camelCase")]
    JoinRequest {
        /// Requester's Ed25519 public key.
        requester_pub_key: PublicKey,
        /// Requester's nickname.
        nickname: String,
        /// Target channel id.
        channel_id: String,
        /// Request time, milliseconds since epoch.
        timestamp: i64,
    },
    /// A member vouches for a requester.
    #[serde(rename_all = "camelCase")]
    Vouch {
        /// Voucher's Ed25519 public key.
        voucher_pub_key: PublicKey,
        /// The peer being vouched for.
        vouchee_pub_key: PublicKey,
        /// Target channel id.
        channel_id: String,
        /// Vouch time, milliseconds since epoch.
        timestamp: i64,
        /// Ed25519 signature over the canonical payload.
        signature: Signature,
    },
}

impl VouchMessage {
    /// Wraps a signed [`Vouch`] for the wire.
    pub fn from_vouch(vouch: Vouch) -> Self {
        Self::Vouch {
            voucher_pub_key: vouch.voucher_pub_key,
            vouchee_pub_key: vouch.vouchee_pub_key,
            channel_id: vouch.channel_id,
            timestamp: vouch.timestamp,
            signature: vouch.signature,
        }
    }

    /// Extracts the [`Vouch`] record, if this is a vouch envelope.
    pub fn into_vouch(self) -> Option<Vouch> {
        match self {
            Self::Vouch {
                voucher_pub_key,
                vouchee_pub_key,
                channel_id,
                timestamp,
                signature,
            } => Some(Vouch {
                voucher_pub_key,
                vouchee_pub_key,
                channel_id,
                timestamp,
                signature,
            }),
            Self::JoinRequest { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_verify_roundtrip() -> ordernet_types::Result<()> {
        let voucher = Keypair::from_seed(&[0x21; 32]);
        let vouchee = Keypair::from_seed(&[0x22; 32]).public_key();

        let vouch = Vouch::create(&voucher, vouchee, "general", 42)?;
        vouch.verify()?;
        Ok(())
    }

    #[test]
    fn tampered_channel_fails_verification() -> ordernet_types::Result<()> {
        let voucher = Keypair::from_seed(&[0x23; 32]);
        let vouchee = Keypair::from_seed(&[0x24; 32]).public_key();

        let mut vouch = Vouch::create(&voucher, vouchee, "general", 42)?;
        vouch.channel_id = "secret".into();
        assert!(vouch.verify().is_err());
        Ok(())
    }

    #[test]
    fn tampered_vouchee_fails_verification() -> ordernet_types::Result<()> {
        let voucher = Keypair::from_seed(&[0x25; 32]);
        let vouchee = Keypair::from_seed(&[0x26; 32]).public_key();

        let mut vouch = Vouch::create(&voucher, vouchee, "general", 42)?;
        vouch.vouchee_pub_key = PublicKey::from_bytes([0xFF; 32]);
        assert!(vouch.verify().is_err());
        Ok(())
    }

    #[test]
    fn join_request_wire_shape() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let msg = VouchMessage::JoinRequest {
            requester_pub_key: PublicKey::from_bytes([0x01; 32]),
            nickname: "bob".into(),
            channel_id: "general".into(),
            timestamp: 7,
        };
        let json = serde_json::to_string(&msg)?;
        assert!(json.contains("\"type\":\"join_request\""));
        assert!(json.contains("\"requesterPubKey\":["));

        let decoded: VouchMessage = serde_json::from_str(&json)?;
        assert_eq!(msg, decoded);
        Ok(())
    }

    #[test]
    fn vouch_wire_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let voucher = Keypair::from_seed(&[0x27; 32]);
        let vouchee = Keypair::from_seed(&[0x28; 32]).public_key();
        let vouch = Vouch::create(&voucher, vouchee, "general", 42)?;

        let msg = VouchMessage::from_vouch(vouch.clone());
        let json = serde_json::to_string(&msg)?;
        assert!(json.contains("\"type\":\"vouch\""));

        let decoded: VouchMessage = serde_json::from_str(&json)?;
        let recovered = decoded.into_vouch().expect("vouch envelope");
        assert_eq!(recovered, vouch);
        recovered.verify()?;
        Ok(())
    }

    #[test]
    fn unknown_type_is_rejected() {
        let json = r#"{"type":"ban_hammer","channelId":"general"}"#;
        let result: std::result::Result<VouchMessage, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
