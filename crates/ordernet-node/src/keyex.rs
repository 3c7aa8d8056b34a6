//! Key-exchange protocol: unicast delivery of channel group keys.
//!
//! The sender side wraps the channel's group key for one recipient
//! (see `ordernet_proto::keyex` for the construction). The receiver
//! side verifies, unwraps, and adopts the channel.
//!
//! The received payload is used to *construct* a fresh channel config
//! with `creator = sender` and `vouch_threshold = 2`, ignoring the
//! inviter's real creator and threshold. This can diverge from the
//! inviter's view; it stands until the payload carries the full
//! config.

use std::collections::BTreeSet;

use ordernet_proto::keyex::KeyExchangePayload;
use ordernet_store::Database;
use ordernet_types::{now_millis, AccessMode, ChannelConfig, OrdernetError, Result};

use crate::channels::ChannelManager;
use crate::identity::IdentityManager;

/// Builds a key-exchange payload delivering `channel_id`'s group key
/// to `recipient`.
///
/// # Errors
///
/// - [`OrdernetError::ConfigError`] when the channel is unknown.
/// - [`OrdernetError::CryptoError`] when the recipient key is invalid
///   or wrapping fails.
pub fn build_key_exchange(
    identity: &IdentityManager,
    channels: &ChannelManager,
    channel_id: &str,
    recipient: &ordernet_crypto::signing::PublicKey,
) -> Result<KeyExchangePayload> {
    let state = channels.get(channel_id).ok_or_else(|| {
        OrdernetError::ConfigError {
            reason: format!("unknown channel '{channel_id}'"),
        }
    })?;

    KeyExchangePayload::build(
        identity.keypair(),
        recipient,
        channel_id,
        &state.group_key,
        now_millis(),
    )
}

/// Processes an inbound key-exchange payload.
///
/// Returns the joined channel id, or `Ok(None)` when the payload is
/// addressed to someone else (a drop, not an error).
///
/// # Errors
///
/// - [`OrdernetError::CryptoError`] on signature or unwrap failure —
///   the payload is discarded.
pub fn process_key_exchange(
    identity: &IdentityManager,
    channels: &mut ChannelManager,
    store: &Database,
    payload: &KeyExchangePayload,
) -> Result<Option<String>> {
    // Addressed to us?
    if payload.recipient_pub_key != identity.public_key() {
        tracing::debug!("key exchange addressed to a different node, dropped");
        return Ok(None);
    }

    // Signature must hold before anything is unwrapped.
    payload.verify()?;

    let group_key = payload.unwrap_group_key(identity.keypair())?;

    let sender_hex = payload.sender_pub_key.to_hex();
    let self_hex = identity.public_hex();

    let mut allowed_members = BTreeSet::new();
    allowed_members.insert(self_hex);
    allowed_members.insert(sender_hex.clone());

    let config = ChannelConfig {
        id: payload.channel_id.clone(),
        name: format!("#{}", payload.channel_id),
        creator_pubkey: sender_hex,
        vouch_threshold: ChannelConfig::DEFAULT_VOUCH_THRESHOLD,
        created_at: payload.timestamp,
        access_mode: AccessMode::Public,
        invite_only: false,
        allowed_members,
    };

    channels.join_channel(store, config, group_key)?;

    tracing::info!(channel = %payload.channel_id, "group key received, channel joined");

    Ok(Some(payload.channel_id.clone()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn node(passphrase_seed: &str) -> (Database, IdentityManager, ChannelManager) {
        let db = Database::open_in_memory().expect("db");
        let identity =
            IdentityManager::load_or_create(&db, passphrase_seed, Some("node")).expect("identity");
        let channels = ChannelManager::load(&db, &identity.public_hex()).expect("channels");
        (db, identity, channels)
    }

    #[test]
    fn key_exchange_end_to_end() -> Result<()> {
        let (db_a, alice, mut channels_a) = node("alice-pass");
        let (db_b, bob, mut channels_b) = node("bob-pass");

        let sender_key = channels_a
            .create_channel(&db_a, "general", None, Default::default())?
            .group_key
            .clone();

        let payload = build_key_exchange(&alice, &channels_a, "general", &bob.public_key())?;
        let joined = process_key_exchange(&bob, &mut channels_b, &db_b, &payload)?;

        assert_eq!(joined.as_deref(), Some("general"));
        let state = channels_b.get("general").expect("joined channel");
        assert_eq!(state.group_key.as_bytes(), sender_key.as_bytes());
        // The receiver records the sender as creator.
        assert_eq!(state.config.creator_pubkey, alice.public_hex());
        assert_eq!(state.config.vouch_threshold, 2);
        assert_eq!(state.config.name, "#general");
        Ok(())
    }

    #[test]
    fn payload_for_other_recipient_is_dropped() -> Result<()> {
        let (db_a, alice, mut channels_a) = node("alice-pass");
        let (_db_b, bob, _) = node("bob-pass");
        let (db_c, charlie, mut channels_c) = node("charlie-pass");

        channels_a.create_channel(&db_a, "general", None, Default::default())?;
        let payload = build_key_exchange(&alice, &channels_a, "general", &bob.public_key())?;

        let joined = process_key_exchange(&charlie, &mut channels_c, &db_c, &payload)?;
        assert!(joined.is_none());
        assert!(channels_c.get("general").is_none());
        Ok(())
    }

    #[test]
    fn tampered_payload_is_discarded() -> Result<()> {
        let (db_a, alice, mut channels_a) = node("alice-pass");
        let (db_b, bob, mut channels_b) = node("bob-pass");

        channels_a.create_channel(&db_a, "general", None, Default::default())?;
        let mut payload = build_key_exchange(&alice, &channels_a, "general", &bob.public_key())?;
        payload.channel_id = "hijacked".into();

        let result = process_key_exchange(&bob, &mut channels_b, &db_b, &payload);
        assert!(result.is_err());
        assert!(channels_b.get("hijacked").is_none());
        Ok(())
    }

    #[test]
    fn unknown_channel_cannot_be_offered() -> Result<()> {
        let (_, alice, channels_a) = node("alice-pass");
        let (_, bob, _) = node("bob-pass");

        let result = build_key_exchange(&alice, &channels_a, "ghost", &bob.public_key());
        assert!(result.is_err());
        Ok(())
    }
}
