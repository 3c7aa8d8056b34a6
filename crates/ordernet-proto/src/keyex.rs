//! Key-exchange payload: per-recipient group-key delivery.
//!
//! The sender wraps a channel group key for one recipient:
//!
//! 1. Generate a fresh ephemeral X25519 pair.
//! 2. `ss = X25519(ephemeral_secret, Montgomery(recipient_ed25519_pub))`.
//! 3. `k = HKDF-SHA256(ss, "ordernet-keyex", 32)`.
//! 4. Encrypt the group key with XChaCha20-Poly1305 under `k` and a
//!    fresh nonce.
//! 5. Sign the canonical JSON of `{sender, recipient, channel,
//!    timestamp}` with the sender's Ed25519 key.
//!
//! The recipient re-derives `ss` from its own converted secret and the
//! ephemeral public key.

use ordernet_types::{OrdernetError, Result};

use ordernet_crypto::aead::{self, AeadNonce};
use ordernet_crypto::ecdh::{
    ecdh_derive_shared, ecdh_derive_shared_ephemeral, ed25519_public_to_x25519,
    ed25519_to_x25519, X25519EphemeralSecret, X25519PublicKey,
};
use ordernet_crypto::hkdf::{hkdf_sha256, KEYEX_INFO};
use ordernet_crypto::keys::GroupKey;
use ordernet_crypto::signing::{self, Keypair, PublicKey, Signature};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// KeyExchangePayload
// ---------------------------------------------------------------------------

/// Wire form of a key-exchange message:
/// `{senderPubKey, recipientPubKey, channelId, encryptedGroupKey,
/// ephemeralPubKey, nonce, timestamp, signature}`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KeyExchangePayload {
    /// Sender's Ed25519 public key.
    pub sender_pub_key: PublicKey,
    /// Intended recipient's Ed25519 public key.
    pub recipient_pub_key: PublicKey,
    /// Channel whose group key is being delivered.
    pub channel_id: String,
    /// Group key wrapped with XChaCha20-Poly1305 (32 + 16 tag bytes).
    pub encrypted_group_key: Vec<u8>,
    /// Ephemeral X25519 public key (Montgomery form).
    pub ephemeral_pub_key: [u8; 32],
    /// AEAD nonce used for the wrap.
    pub nonce: AeadNonce,
    /// Creation time, milliseconds since epoch.
    pub timestamp: i64,
    /// Ed25519 signature over the canonical signable payload.
    pub signature: Signature,
}

/// The signed portion: `{sender, recipient, channel, timestamp}`.
#[derive(Serialize)]
struct KeyExchangeSignable<'a> {
    sender: &'a PublicKey,
    recipient: &'a PublicKey,
    channel: &'a str,
    timestamp: i64,
}

impl KeyExchangePayload {
    /// Builds a payload wrapping `group_key` for `recipient`.
    pub fn build(
        sender: &Keypair,
        recipient: &PublicKey,
        channel_id: &str,
        group_key: &GroupKey,
        timestamp: i64,
    ) -> Result<Self> {
        // Ephemeral ECDH against the recipient's converted public key.
        let ephemeral = X25519EphemeralSecret::generate();
        let ephemeral_pub = ephemeral.public_key();
        let recipient_mont = ed25519_public_to_x25519(recipient)?;
        let shared = ecdh_derive_shared_ephemeral(ephemeral, &recipient_mont);

        // Derive the wrapping key and encrypt the group key.
        let wrap_key = hkdf_sha256(shared.as_bytes(), KEYEX_INFO)?;
        let nonce = aead::generate_aead_nonce();
        let encrypted_group_key =
            aead::encrypt(wrap_key.as_bytes(), &nonce, group_key.as_bytes(), &[])?;

        // Sign the canonical signable payload.
        let sender_pub = sender.public_key();
        let bytes = signable_bytes(&sender_pub, recipient, channel_id, timestamp)?;
        let signature = sender.sign(&bytes);

        Ok(Self {
            sender_pub_key: sender_pub,
            recipient_pub_key: *recipient,
            channel_id: channel_id.to_string(),
            encrypted_group_key,
            ephemeral_pub_key: *ephemeral_pub.as_bytes(),
            nonce,
            timestamp,
            signature,
        })
    }

    /// Verifies the payload's signature against the sender's key.
    pub fn verify(&self) -> Result<()> {
        let bytes = signable_bytes(
            &self.sender_pub_key,
            &self.recipient_pub_key,
            &self.channel_id,
            self.timestamp,
        )?;
        signing::verify(&self.sender_pub_key, &bytes, &self.signature)
    }

    /// Unwraps the group key using the recipient's Ed25519 keypair.
    ///
    /// # Errors
    ///
    /// Returns [`OrdernetError::CryptoError`] if this node is not the
    /// recipient or the AEAD tag does not verify.
    pub fn unwrap_group_key(&self, recipient: &Keypair) -> Result<GroupKey> {
        if recipient.public_key() != self.recipient_pub_key {
            return Err(OrdernetError::CryptoError {
                reason: "key exchange payload addressed to a different key".into(),
            });
        }

        let (recipient_secret, _) = ed25519_to_x25519(recipient)?;
        let ephemeral_pub = X25519PublicKey::from_bytes(self.ephemeral_pub_key);
        let shared = ecdh_derive_shared(&recipient_secret, &ephemeral_pub);

        let wrap_key = hkdf_sha256(shared.as_bytes(), KEYEX_INFO)?;
        let key_bytes = aead::decrypt(
            wrap_key.as_bytes(),
            &self.nonce,
            &self.encrypted_group_key,
            &[],
        )?;

        GroupKey::from_slice(&key_bytes)
    }

    /// Serializes to canonical JSON wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| OrdernetError::MalformedEnvelope {
            reason: format!("key exchange serialization failed: {e}"),
        })
    }

    /// Deserializes from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| OrdernetError::MalformedEnvelope {
            reason: format!("key exchange parse failed: {e}"),
        })
    }
}

/// Canonical bytes of the signable payload.
fn signable_bytes(
    sender: &PublicKey,
    recipient: &PublicKey,
    channel: &str,
    timestamp: i64,
) -> Result<Vec<u8>> {
    serde_json::to_vec(&KeyExchangeSignable {
        sender,
        recipient,
        channel,
        timestamp,
    })
    .map_err(|e| OrdernetError::MalformedEnvelope {
        reason: format!("key exchange signable serialization failed: {e}"),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_roundtrip() -> ordernet_types::Result<()> {
        let sender = Keypair::from_seed(&[0x31; 32]);
        let recipient = Keypair::from_seed(&[0x32; 32]);
        let group_key = GroupKey::generate();

        let payload = KeyExchangePayload::build(
            &sender,
            &recipient.public_key(),
            "general",
            &group_key,
            99,
        )?;
        payload.verify()?;

        let unwrapped = payload.unwrap_group_key(&recipient)?;
        assert_eq!(unwrapped.as_bytes(), group_key.as_bytes());
        Ok(())
    }

    #[test]
    fn wrong_recipient_cannot_unwrap() -> ordernet_types::Result<()> {
        let sender = Keypair::from_seed(&[0x33; 32]);
        let recipient = Keypair::from_seed(&[0x34; 32]);
        let eavesdropper = Keypair::from_seed(&[0x35; 32]);
        let group_key = GroupKey::generate();

        let payload = KeyExchangePayload::build(
            &sender,
            &recipient.public_key(),
            "general",
            &group_key,
            99,
        )?;

        assert!(payload.unwrap_group_key(&eavesdropper).is_err());
        Ok(())
    }

    #[test]
    fn tampered_ciphertext_fails_unwrap() -> ordernet_types::Result<()> {
        let sender = Keypair::from_seed(&[0x36; 32]);
        let recipient = Keypair::from_seed(&[0x37; 32]);
        let group_key = GroupKey::generate();

        let mut payload = KeyExchangePayload::build(
            &sender,
            &recipient.public_key(),
            "general",
            &group_key,
            99,
        )?;
        payload.encrypted_group_key[0] ^= 0x01;

        assert!(payload.unwrap_group_key(&recipient).is_err());
        Ok(())
    }

    #[test]
    fn tampered_channel_fails_verification() -> ordernet_types::Result<()> {
        let sender = Keypair::from_seed(&[0x38; 32]);
        let recipient = Keypair::from_seed(&[0x39; 32]);
        let group_key = GroupKey::generate();

        let mut payload = KeyExchangePayload::build(
            &sender,
            &recipient.public_key(),
            "general",
            &group_key,
            99,
        )?;
        payload.channel_id = "other".into();

        assert!(payload.verify().is_err());
        Ok(())
    }

    #[test]
    fn wire_roundtrip() -> ordernet_types::Result<()> {
        let sender = Keypair::from_seed(&[0x3A; 32]);
        let recipient = Keypair::from_seed(&[0x3B; 32]);
        let group_key = GroupKey::generate();

        let payload = KeyExchangePayload::build(
            &sender,
            &recipient.public_key(),
            "general",
            &group_key,
            99,
        )?;

        let bytes = payload.to_bytes()?;
        let json = String::from_utf8(bytes.clone()).unwrap();
        assert!(json.contains("\"encryptedGroupKey\":["));
        assert!(json.contains("\"ephemeralPubKey\":["));

        let decoded = KeyExchangePayload::from_bytes(&bytes)?;
        assert_eq!(payload, decoded);
        decoded.verify()?;
        assert_eq!(
            decoded.unwrap_group_key(&recipient)?.as_bytes(),
            group_key.as_bytes()
        );
        Ok(())
    }
}
