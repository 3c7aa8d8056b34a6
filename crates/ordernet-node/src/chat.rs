//! Chat protocol: encrypt-sign outgoing, verify-decrypt-dedup incoming.
//!
//! Send path:
//!
//! 1. Require `has_access(channel, self)` — denial is an error the
//!    façade surfaces as an `error` event.
//! 2. Build the canonical plaintext `{content, senderNick}`.
//! 3. Encrypt under the channel group key with a fresh 24-byte nonce.
//! 4. Sign the ciphertext with the identity's Ed25519 key.
//! 5. Persist locally and hand the envelope to the publisher.
//!
//! Receive path (all failures are local drops):
//!
//! 1. Recover the channel id from the topic suffix.
//! 2. Dedup on `message_id` against the store.
//! 3. Resolve the channel (unknown → drop) and cross-check the
//!    envelope's channel id against the topic.
//! 4. Verify the signature over the ciphertext.
//! 5. Decrypt and parse.
//! 6. Enforce `has_access(channel, sender)` — drop without logging
//!    plaintext.
//! 7. Persist (`INSERT OR IGNORE`) and deliver.

use ordernet_crypto::aead;
use ordernet_proto::chat::{new_message_id, EncryptedMessage, PlaintextBody};
use ordernet_proto::topics;
use ordernet_store::Database;
use ordernet_types::{now_millis, OrdernetError, PlainMessage, Result};

use crate::channels::{ChannelManager, ChannelState};
use crate::identity::IdentityManager;

// ---------------------------------------------------------------------------
// Send path
// ---------------------------------------------------------------------------

/// Builds a signed, encrypted envelope for `content`.
///
/// Returns the wire envelope plus the decrypted echo for the local UI.
///
/// # Errors
///
/// - [`OrdernetError::AccessDenied`] when the channel is unknown or
///   the local identity is not allowed to send on it.
/// - [`OrdernetError::CryptoError`] on encryption failure.
pub fn seal_message(
    identity: &IdentityManager,
    channels: &ChannelManager,
    channel_id: &str,
    content: &str,
) -> Result<(EncryptedMessage, PlainMessage)> {
    let self_hex = identity.public_hex();

    let state: &ChannelState = channels.get(channel_id).ok_or_else(|| {
        OrdernetError::AccessDenied {
            reason: format!("unknown channel '{channel_id}'"),
        }
    })?;

    if !channels.has_access(channel_id, &self_hex) {
        return Err(OrdernetError::AccessDenied {
            reason: format!("not allowed to send on '{channel_id}'"),
        });
    }

    let body = PlaintextBody {
        content: content.to_string(),
        sender_nick: identity.nickname().to_string(),
    };
    let plaintext = body.to_bytes()?;

    let nonce = aead::generate_aead_nonce();
    let ciphertext = aead::encrypt(state.group_key.as_bytes(), &nonce, &plaintext, &[])?;
    let signature = identity.keypair().sign(&ciphertext);

    let timestamp = now_millis();
    let message_id = new_message_id();

    let envelope = EncryptedMessage {
        nonce,
        ciphertext,
        sender_pub_key: identity.public_key(),
        signature,
        timestamp,
        channel_id: channel_id.to_string(),
        message_id: message_id.clone(),
    };

    let plain = PlainMessage {
        channel_id: channel_id.to_string(),
        content: body.content,
        sender_nick: body.sender_nick,
        sender_pubkey: self_hex,
        timestamp,
        message_id,
    };

    Ok((envelope, plain))
}

// ---------------------------------------------------------------------------
// Receive path
// ---------------------------------------------------------------------------

/// Processes an inbound gossip payload from a chat topic.
///
/// Returns `Ok(Some(plain))` when the message is new, valid, and
/// allowed; `Ok(None)` for benign drops (duplicate id, unknown
/// channel, sender not allowed); `Err` for malformed or cryptographic
/// failures. The caller treats every non-`Some` outcome as a local
/// drop — nothing propagates to peers.
pub fn process_incoming(
    topic: &str,
    bytes: &[u8],
    channels: &ChannelManager,
    store: &Database,
) -> Result<Option<PlainMessage>> {
    let Some(topic_channel) = topics::channel_from_topic(topic) else {
        return Err(OrdernetError::MalformedEnvelope {
            reason: format!("not a chat topic: '{topic}'"),
        });
    };

    let envelope = EncryptedMessage::from_bytes(bytes)?;

    // Dedup before any crypto work.
    if store.message_exists(&envelope.message_id)? {
        return Ok(None);
    }

    // Unknown channel: we have no key, drop silently.
    let Some(state) = channels.get(topic_channel) else {
        tracing::debug!(channel = %topic_channel, "message for unknown channel dropped");
        return Ok(None);
    };

    // The envelope must agree with the topic it arrived on.
    if envelope.channel_id != topic_channel {
        return Err(OrdernetError::MalformedEnvelope {
            reason: "envelope channel does not match topic".into(),
        });
    }

    // Signature covers the ciphertext bytes.
    ordernet_crypto::signing::verify(
        &envelope.sender_pub_key,
        &envelope.ciphertext,
        &envelope.signature,
    )?;

    // Decrypt and parse.
    let plaintext = aead::decrypt(
        state.group_key.as_bytes(),
        &envelope.nonce,
        &envelope.ciphertext,
        &[],
    )?;
    let body = PlaintextBody::from_bytes(&plaintext)?;

    // Access control on the sender. Dropped without logging the
    // decrypted content.
    let sender_hex = envelope.sender_pub_key.to_hex();
    if !channels.has_access(topic_channel, &sender_hex) {
        tracing::debug!(channel = %topic_channel, "message from non-member dropped");
        return Ok(None);
    }

    // Persist the encrypted form; a concurrent duplicate is absorbed.
    store.insert_message(&envelope)?;

    Ok(Some(PlainMessage {
        channel_id: envelope.channel_id,
        content: body.content,
        sender_nick: body.sender_nick,
        sender_pubkey: sender_hex,
        timestamp: envelope.timestamp,
        message_id: envelope.message_id,
    }))
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Decrypts up to `limit` stored messages of a channel, oldest first.
///
/// Messages that no longer decrypt (key rotated away from under them)
/// are skipped rather than failing the whole listing.
pub fn channel_history(
    channels: &ChannelManager,
    store: &Database,
    channel_id: &str,
    limit: u32,
) -> Result<Vec<PlainMessage>> {
    let Some(state) = channels.get(channel_id) else {
        return Ok(Vec::new());
    };

    let mut history = Vec::new();
    for envelope in store.channel_history(channel_id, limit)? {
        let plaintext = match aead::decrypt(
            state.group_key.as_bytes(),
            &envelope.nonce,
            &envelope.ciphertext,
            &[],
        ) {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::debug!(message_id = %envelope.message_id, "stored message no longer decrypts");
                continue;
            }
        };
        let Ok(body) = PlaintextBody::from_bytes(&plaintext) else {
            continue;
        };

        history.push(PlainMessage {
            channel_id: envelope.channel_id,
            content: body.content,
            sender_nick: body.sender_nick,
            sender_pubkey: envelope.sender_pub_key.to_hex(),
            timestamp: envelope.timestamp,
            message_id: envelope.message_id,
        });
    }
    Ok(history)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelOverrides;
    use ordernet_types::AccessMode;

    /// Two stores sharing a channel with the same group key, plus an
    /// identity on each side.
    fn two_nodes() -> (Database, IdentityManager, ChannelManager, Database, IdentityManager, ChannelManager)
    {
        let db_a = Database::open_in_memory().expect("db a");
        let alice = IdentityManager::load_or_create(&db_a, "pass", Some("alice")).expect("alice");
        let mut channels_a = ChannelManager::load(&db_a, &alice.public_hex()).expect("manager a");
        let state = channels_a
            .create_channel(&db_a, "#general", None, Default::default())
            .expect("channel");
        let config = state.config.clone();
        let key = state.group_key.clone();

        let db_b = Database::open_in_memory().expect("db b");
        let bob = IdentityManager::load_or_create(&db_b, "pass", Some("bob")).expect("bob");
        let mut channels_b = ChannelManager::load(&db_b, &bob.public_hex()).expect("manager b");
        channels_b.join_channel(&db_b, config, key).expect("join");

        (db_a, alice, channels_a, db_b, bob, channels_b)
    }

    #[test]
    fn seal_then_receive_delivers_content() -> Result<()> {
        let (db_a, alice, channels_a, db_b, _bob, channels_b) = two_nodes();

        let (envelope, echo) = seal_message(&alice, &channels_a, "general", "hi")?;
        db_a.insert_message(&envelope)?;
        assert_eq!(echo.content, "hi");
        assert_eq!(echo.sender_nick, "alice");

        let topic = topics::chat_topic("general");
        let plain = process_incoming(&topic, &envelope.to_bytes()?, &channels_b, &db_b)?
            .expect("delivered");
        assert_eq!(plain.content, "hi");
        assert_eq!(plain.sender_nick, "alice");
        assert_eq!(plain.sender_pubkey, alice.public_hex());
        Ok(())
    }

    #[test]
    fn duplicate_message_id_is_dropped() -> Result<()> {
        let (_db_a, alice, channels_a, db_b, _bob, channels_b) = two_nodes();

        let (envelope, _) = seal_message(&alice, &channels_a, "general", "once")?;
        let topic = topics::chat_topic("general");
        let bytes = envelope.to_bytes()?;

        assert!(process_incoming(&topic, &bytes, &channels_b, &db_b)?.is_some());
        assert!(process_incoming(&topic, &bytes, &channels_b, &db_b)?.is_none());
        Ok(())
    }

    #[test]
    fn unknown_channel_is_dropped() -> Result<()> {
        let (_db_a, alice, channels_a, db_b, _bob, channels_b) = two_nodes();

        let (envelope, _) = seal_message(&alice, &channels_a, "general", "hi")?;
        // Bob is not on #random.
        let mut rogue = envelope.clone();
        rogue.channel_id = "random".into();
        let topic = topics::chat_topic("random");

        assert!(process_incoming(&topic, &rogue.to_bytes()?, &channels_b, &db_b)?.is_none());
        Ok(())
    }

    #[test]
    fn channel_topic_mismatch_is_malformed() -> Result<()> {
        let (_db_a, alice, channels_a, db_b, _bob, mut channels_b) = two_nodes();

        // Bob also has #other, so the channel resolves but the envelope
        // claims #general.
        channels_b
            .create_channel(&db_b, "other", None, Default::default())
            .expect("other");

        let (envelope, _) = seal_message(&alice, &channels_a, "general", "hi")?;
        let topic = topics::chat_topic("other");
        let result = process_incoming(&topic, &envelope.to_bytes()?, &channels_b, &db_b);
        assert!(matches!(
            result,
            Err(OrdernetError::MalformedEnvelope { .. })
        ));
        Ok(())
    }

    #[test]
    fn tampered_ciphertext_is_rejected() -> Result<()> {
        let (_db_a, alice, channels_a, db_b, _bob, channels_b) = two_nodes();

        let (mut envelope, _) = seal_message(&alice, &channels_a, "general", "hi")?;
        envelope.ciphertext[0] ^= 0x01;

        let topic = topics::chat_topic("general");
        let result = process_incoming(&topic, &envelope.to_bytes()?, &channels_b, &db_b);
        assert!(matches!(result, Err(OrdernetError::CryptoError { .. })));
        Ok(())
    }

    #[test]
    fn non_member_sender_is_dropped_on_private_channel() -> Result<()> {
        // Bob runs a private channel; Charlie has the key but is not
        // allowlisted.
        let db_b = Database::open_in_memory()?;
        let bob = IdentityManager::load_or_create(&db_b, "pass", Some("bob"))?;
        let mut channels_b = ChannelManager::load(&db_b, &bob.public_hex())?;
        let state = channels_b.create_private_channel(&db_b, "#team", vec![], None)?;
        let config = state.config.clone();
        let key = state.group_key.clone();

        let db_c = Database::open_in_memory()?;
        let charlie = IdentityManager::load_or_create(&db_c, "pass", Some("charlie"))?;
        let mut channels_c = ChannelManager::load(&db_c, &charlie.public_hex())?;
        // Charlie's own view of the channel allows him (he would not
        // refuse his own send), but Bob's allowlist does not.
        let mut config_c = config.clone();
        config_c.allowed_members.insert(charlie.public_hex());
        channels_c.join_channel(&db_c, config_c, key)?;

        let (envelope, _) = seal_message(&charlie, &channels_c, "team", "let me in")?;
        let topic = topics::chat_topic("team");
        assert!(process_incoming(&topic, &envelope.to_bytes()?, &channels_b, &db_b)?.is_none());
        Ok(())
    }

    #[test]
    fn send_denied_without_access() -> Result<()> {
        // Charlie knows of a private channel where he is not allowed.
        let db_c = Database::open_in_memory()?;
        let charlie = IdentityManager::load_or_create(&db_c, "pass", Some("charlie"))?;
        let mut channels_c = ChannelManager::load(&db_c, &charlie.public_hex())?;

        let config = ordernet_types::ChannelConfig {
            id: "team".into(),
            name: "#team".into(),
            creator_pubkey: "aa".repeat(32),
            vouch_threshold: 2,
            created_at: 0,
            access_mode: AccessMode::Private,
            invite_only: true,
            allowed_members: std::iter::once("aa".repeat(32)).collect(),
        };
        channels_c.join_channel(&db_c, config, ordernet_crypto::keys::GroupKey::generate())?;

        let result = seal_message(&charlie, &channels_c, "team", "hi");
        assert!(matches!(result, Err(OrdernetError::AccessDenied { .. })));
        Ok(())
    }

    #[test]
    fn history_roundtrip_after_restart() -> Result<()> {
        let (db_a, alice, mut channels_a, _db_b, _bob, _channels_b) = two_nodes();

        for text in ["one", "two", "three"] {
            let (envelope, _) = seal_message(&alice, &channels_a, "general", text)?;
            db_a.insert_message(&envelope)?;
        }

        // Simulate restart: reload the channel manager from the store.
        channels_a = ChannelManager::load(&db_a, &alice.public_hex())?;
        let history = channel_history(&channels_a, &db_a, "general", 50)?;
        assert_eq!(history.len(), 3);
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert!(contents.contains(&"one"));
        assert!(contents.contains(&"three"));
        Ok(())
    }

    #[test]
    fn history_for_unknown_channel_is_empty() -> Result<()> {
        let (db_a, _alice, channels_a, ..) = two_nodes();
        assert!(channel_history(&channels_a, &db_a, "nope", 10)?.is_empty());
        Ok(())
    }

    #[test]
    fn dm_channels_reach_both_ends() -> Result<()> {
        let db_a = Database::open_in_memory()?;
        let alice = IdentityManager::load_or_create(&db_a, "pass", Some("alice"))?;
        let mut channels_a = ChannelManager::load(&db_a, &alice.public_hex())?;

        let db_b = Database::open_in_memory()?;
        let bob = IdentityManager::load_or_create(&db_b, "pass", Some("bob"))?;
        let mut channels_b = ChannelManager::load(&db_b, &bob.public_hex())?;

        let state = channels_a.create_dm_channel(&db_a, &bob.public_hex())?;
        let dm_id = state.config.id.clone();
        let config = state.config.clone();
        let key = state.group_key.clone();

        // Both ends derive the same id.
        assert_eq!(
            dm_id,
            ChannelManager::dm_channel_id(&bob.public_hex(), &alice.public_hex())
        );

        channels_b.join_channel(&db_b, config, key)?;
        let (envelope, _) = seal_message(&alice, &channels_a, &dm_id, "psst")?;
        let topic = topics::chat_topic(&dm_id);
        let plain = process_incoming(&topic, &envelope.to_bytes()?, &channels_b, &db_b)?
            .expect("delivered");
        assert_eq!(plain.content, "psst");
        Ok(())
    }

    #[test]
    fn overrides_are_respected() -> Result<()> {
        let db = Database::open_in_memory()?;
        let id = IdentityManager::load_or_create(&db, "pass", Some("x"))?;
        let mut channels = ChannelManager::load(&db, &id.public_hex())?;

        let state = channels.create_channel(
            &db,
            "locked",
            None,
            ChannelOverrides {
                access_mode: Some(AccessMode::Private),
                invite_only: Some(true),
                allowed_members: vec![],
            },
        )?;
        assert!(state.config.invite_only);
        Ok(())
    }
}
