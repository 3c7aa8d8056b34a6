//! Vouch protocol: unicast join requests and vouches.
//!
//! Inbound `join_request` envelopes are persisted and surfaced to the
//! consumer. Inbound `vouch` envelopes are verified (invalid ones are
//! discarded, not saved), saved idempotently, and run through the
//! threshold evaluator. Approval is reported back so the event loop
//! can emit `channel-joined` and kick off the key exchange — the
//! trust-to-key-exchange cycle is broken through that orchestration.

use ordernet_proto::vouch::{Vouch, VouchMessage};
use ordernet_store::Database;
use ordernet_types::Result;

use crate::channels::ChannelManager;
use crate::trust::{self, ThresholdResult};

// ---------------------------------------------------------------------------
// VouchOutcome
// ---------------------------------------------------------------------------

/// What an inbound vouch-protocol envelope amounted to.
#[derive(Clone, Debug)]
pub enum VouchOutcome {
    /// A join request was recorded (or re-received).
    JoinRequested {
        /// Requester's lowercase hex pubkey.
        requester_hex: String,
        /// Requester's nickname.
        nickname: String,
        /// Target channel.
        channel_id: String,
    },
    /// A valid vouch was recorded.
    VouchRecorded {
        /// The verified vouch.
        vouch: Vouch,
        /// Threshold evaluation, when the channel is known locally.
        threshold: Option<ThresholdResult>,
    },
}

// ---------------------------------------------------------------------------
// Inbound processing
// ---------------------------------------------------------------------------

/// Processes an inbound vouch-protocol envelope.
///
/// # Errors
///
/// - [`ordernet_types::OrdernetError::CryptoError`] when a vouch
///   signature fails verification — the vouch is discarded unsaved.
/// - [`ordernet_types::OrdernetError::StorageError`] on database
///   failures.
pub fn process_vouch_message(
    store: &Database,
    channels: &ChannelManager,
    message: VouchMessage,
) -> Result<VouchOutcome> {
    match message {
        VouchMessage::JoinRequest {
            requester_pub_key,
            nickname,
            channel_id,
            ..
        } => {
            let requester_hex = requester_pub_key.to_hex();
            let created = trust::create_join_request(store, &requester_hex, &channel_id)?;
            tracing::info!(
                channel = %channel_id,
                %nickname,
                created,
                "join request received"
            );

            Ok(VouchOutcome::JoinRequested {
                requester_hex,
                nickname,
                channel_id,
            })
        }

        VouchMessage::Vouch {
            voucher_pub_key,
            vouchee_pub_key,
            channel_id,
            timestamp,
            signature,
        } => {
            let vouch = Vouch {
                voucher_pub_key,
                vouchee_pub_key,
                channel_id,
                timestamp,
                signature,
            };

            // Invalid signature: discard, never save.
            trust::verify_vouch(&vouch)?;

            trust::save_vouch(store, &vouch)?;

            let threshold = trust::process_vouch_and_check_threshold(
                store,
                channels,
                &vouch.vouchee_pub_key.to_hex(),
                &vouch.channel_id,
            )?;

            Ok(VouchOutcome::VouchRecorded { vouch, threshold })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ordernet_crypto::signing::{Keypair, PublicKey};
    use ordernet_types::JoinStatus;

    const SELF_HEX: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn setup(threshold: u32) -> (Database, ChannelManager) {
        let db = Database::open_in_memory().expect("db");
        let mut manager = ChannelManager::load(&db, SELF_HEX).expect("manager");
        manager
            .create_channel(&db, "general", Some(threshold), Default::default())
            .expect("channel");
        (db, manager)
    }

    fn join_request(seed: u8) -> (VouchMessage, PublicKey) {
        let requester = Keypair::from_seed(&[seed; 32]).public_key();
        (
            VouchMessage::JoinRequest {
                requester_pub_key: requester,
                nickname: "bob".into(),
                channel_id: "general".into(),
                timestamp: 1_000,
            },
            requester,
        )
    }

    #[test]
    fn join_request_is_persisted() -> Result<()> {
        let (db, manager) = setup(2);
        let (message, requester) = join_request(9);

        let outcome = process_vouch_message(&db, &manager, message)?;
        match outcome {
            VouchOutcome::JoinRequested {
                requester_hex,
                channel_id,
                ..
            } => {
                assert_eq!(requester_hex, requester.to_hex());
                assert_eq!(channel_id, "general");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let request = db
            .get_join_request(&requester.to_hex(), "general")?
            .expect("row");
        assert_eq!(request.status, JoinStatus::Pending);
        Ok(())
    }

    #[test]
    fn vouches_accumulate_to_approval() -> Result<()> {
        let (db, manager) = setup(2);
        let (request, requester) = join_request(9);
        process_vouch_message(&db, &manager, request)?;

        // First vouch: pending.
        let vouch1 = Vouch::create(&Keypair::from_seed(&[1; 32]), requester, "general", 1)?;
        let outcome = process_vouch_message(&db, &manager, VouchMessage::from_vouch(vouch1))?;
        match outcome {
            VouchOutcome::VouchRecorded { threshold, .. } => {
                let t = threshold.expect("known channel");
                assert!(!t.approved);
                assert_eq!(t.count, 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // Second vouch: approved.
        let vouch2 = Vouch::create(&Keypair::from_seed(&[2; 32]), requester, "general", 2)?;
        let outcome = process_vouch_message(&db, &manager, VouchMessage::from_vouch(vouch2))?;
        match outcome {
            VouchOutcome::VouchRecorded { threshold, .. } => {
                assert!(threshold.expect("known channel").approved);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let request = db
            .get_join_request(&requester.to_hex(), "general")?
            .expect("row");
        assert_eq!(request.status, JoinStatus::Approved);
        Ok(())
    }

    #[test]
    fn forged_vouch_is_discarded() -> Result<()> {
        let (db, manager) = setup(2);
        let requester = Keypair::from_seed(&[9; 32]).public_key();

        let mut vouch = Vouch::create(&Keypair::from_seed(&[1; 32]), requester, "general", 1)?;
        vouch.channel_id = "elsewhere".into();

        let result = process_vouch_message(&db, &manager, VouchMessage::from_vouch(vouch));
        assert!(result.is_err());
        assert_eq!(db.vouch_count(&requester.to_hex(), "elsewhere")?, 0);
        Ok(())
    }

    #[test]
    fn replayed_vouch_does_not_double_count() -> Result<()> {
        let (db, manager) = setup(2);
        let requester = Keypair::from_seed(&[9; 32]).public_key();

        let vouch = Vouch::create(&Keypair::from_seed(&[1; 32]), requester, "general", 1)?;
        process_vouch_message(&db, &manager, VouchMessage::from_vouch(vouch.clone()))?;
        process_vouch_message(&db, &manager, VouchMessage::from_vouch(vouch))?;

        assert_eq!(db.vouch_count(&requester.to_hex(), "general")?, 1);
        Ok(())
    }

    #[test]
    fn vouch_for_unknown_channel_skips_threshold() -> Result<()> {
        let (db, manager) = setup(2);
        let requester = Keypair::from_seed(&[9; 32]).public_key();

        let vouch = Vouch::create(&Keypair::from_seed(&[1; 32]), requester, "elsewhere", 1)?;
        let outcome = process_vouch_message(&db, &manager, VouchMessage::from_vouch(vouch))?;
        match outcome {
            VouchOutcome::VouchRecorded { threshold, .. } => assert!(threshold.is_none()),
            other => panic!("unexpected outcome: {other:?}"),
        }
        Ok(())
    }
}
