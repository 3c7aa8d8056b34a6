//! Encrypted chat message envelope.
//!
//! On-wire and at-rest form of a channel message. The Ed25519
//! signature covers the **ciphertext bytes only**; `timestamp` and
//! `messageId` are advisory, and `channelId` is additionally checked
//! against the topic the envelope arrived on.

use ordernet_types::{OrdernetError, Result};

use ordernet_crypto::aead::AeadNonce;
use ordernet_crypto::signing::{PublicKey, Signature};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EncryptedMessage
// ---------------------------------------------------------------------------

/// Wire envelope of a channel message.
///
/// Serialized as canonical JSON with byte fields as integer arrays:
/// `{nonce, ciphertext, senderPubKey, signature, timestamp, channelId,
/// messageId}`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EncryptedMessage {
    /// AEAD nonce used for this message (24 bytes).
    pub nonce: AeadNonce,
    /// XChaCha20-Poly1305 ciphertext with appended tag.
    pub ciphertext: Vec<u8>,
    /// Sender's Ed25519 public key (32 bytes).
    pub sender_pub_key: PublicKey,
    /// Ed25519 signature over the ciphertext bytes (64 bytes).
    pub signature: Signature,
    /// Sender-claimed timestamp, milliseconds since epoch. Advisory.
    pub timestamp: i64,
    /// Channel the message belongs to.
    pub channel_id: String,
    /// Globally unique message id (hex of 16 random bytes).
    pub message_id: String,
}

impl EncryptedMessage {
    /// Serializes the envelope to its canonical JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| OrdernetError::MalformedEnvelope {
            reason: format!("chat envelope serialization failed: {e}"),
        })
    }

    /// Deserializes an envelope from wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`OrdernetError::MalformedEnvelope`] on any parse
    /// failure, missing field, or wrong byte length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| OrdernetError::MalformedEnvelope {
            reason: format!("chat envelope parse failed: {e}"),
        })
    }
}

// ---------------------------------------------------------------------------
// PlaintextBody
// ---------------------------------------------------------------------------

/// Decrypted interior of a chat message.
///
/// Canonical JSON `{content, senderNick}` — this is what gets
/// AEAD-encrypted under the channel group key.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaintextBody {
    /// Message text.
    pub content: String,
    /// Sender's nickname at send time.
    pub sender_nick: String,
}

impl PlaintextBody {
    /// Serializes the body to its canonical JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| OrdernetError::MalformedEnvelope {
            reason: format!("plaintext body serialization failed: {e}"),
        })
    }

    /// Parses a decrypted body.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| OrdernetError::MalformedEnvelope {
            reason: format!("plaintext body parse failed: {e}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Message ids
// ---------------------------------------------------------------------------

/// Byte length of the random message id.
pub const MESSAGE_ID_LEN: usize = 16;

/// Generates a fresh message id: lowercase hex of 16 random bytes.
///
/// Globally unique with overwhelming probability; the store enforces
/// uniqueness on insert.
pub fn new_message_id() -> String {
    let mut bytes = [0u8; MESSAGE_ID_LEN];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_envelope() -> EncryptedMessage {
        EncryptedMessage {
            nonce: AeadNonce::from_bytes([0xAA; 24]),
            ciphertext: vec![0xDE, 0xAD, 0xBE, 0xEF],
            sender_pub_key: PublicKey::from_bytes([0x01; 32]),
            signature: Signature::from_bytes([0x02; 64]),
            timestamp: 1_700_000_000_000,
            channel_id: "general".into(),
            message_id: "00112233445566778899aabbccddeeff".into(),
        }
    }

    #[test]
    fn envelope_roundtrip_is_byte_identical() -> ordernet_types::Result<()> {
        let envelope = sample_envelope();
        let bytes1 = envelope.to_bytes()?;
        let decoded = EncryptedMessage::from_bytes(&bytes1)?;
        let bytes2 = decoded.to_bytes()?;
        assert_eq!(envelope, decoded);
        assert_eq!(bytes1, bytes2);
        Ok(())
    }

    #[test]
    fn envelope_uses_camel_case_wire_names() -> ordernet_types::Result<()> {
        let json = String::from_utf8(sample_envelope().to_bytes()?).unwrap();
        for key in [
            "\"nonce\"",
            "\"ciphertext\"",
            "\"senderPubKey\"",
            "\"signature\"",
            "\"timestamp\"",
            "\"channelId\"",
            "\"messageId\"",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
        Ok(())
    }

    #[test]
    fn byte_fields_encode_as_integer_arrays() -> ordernet_types::Result<()> {
        let json = String::from_utf8(sample_envelope().to_bytes()?).unwrap();
        assert!(json.contains("\"ciphertext\":[222,173,190,239]"));
        assert!(json.contains("\"nonce\":[170,"));
        Ok(())
    }

    #[test]
    fn missing_field_is_malformed() {
        let json = br#"{"nonce":[0],"ciphertext":[]}"#;
        assert!(EncryptedMessage::from_bytes(json).is_err());
    }

    #[test]
    fn wrong_pubkey_length_is_malformed() {
        let mut value = serde_json::to_value(sample_envelope()).unwrap();
        value["senderPubKey"] = serde_json::json!([1, 2, 3]);
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(EncryptedMessage::from_bytes(&bytes).is_err());
    }

    #[test]
    fn unknown_field_is_malformed() {
        let mut value = serde_json::to_value(sample_envelope()).unwrap();
        value["extra"] = serde_json::json!(1);
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(EncryptedMessage::from_bytes(&bytes).is_err());
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(EncryptedMessage::from_bytes(b"not json").is_err());
    }

    #[test]
    fn plaintext_body_roundtrip() -> ordernet_types::Result<()> {
        let body = PlaintextBody {
            content: "hi there".into(),
            sender_nick: "alice".into(),
        };
        let bytes = body.to_bytes()?;
        let json = String::from_utf8(bytes.clone()).unwrap();
        assert!(json.contains("\"senderNick\":\"alice\""));
        assert_eq!(PlaintextBody::from_bytes(&bytes)?, body);
        Ok(())
    }

    #[test]
    fn message_ids_are_hex_and_unique() {
        let id1 = new_message_id();
        let id2 = new_message_id();
        assert_eq!(id1.len(), MESSAGE_ID_LEN * 2);
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id1, id2);
    }
}
