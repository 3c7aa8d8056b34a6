//! Vouches, join requests, and threshold evaluation.
//!
//! A join request transitions `pending → approved` when the number of
//! distinct vouchers for the requester reaches the channel's vouch
//! threshold. Vouch signatures are verified before saving; an invalid
//! vouch is discarded, not stored. Double-vouching is a no-op (the
//! store's composite primary key absorbs it).

use ordernet_crypto::signing::{Keypair, PublicKey};
use ordernet_proto::vouch::Vouch;
use ordernet_store::Database;
use ordernet_types::{now_millis, JoinStatus, Result};

use crate::channels::ChannelManager;

// ---------------------------------------------------------------------------
// ThresholdResult
// ---------------------------------------------------------------------------

/// Outcome of a threshold evaluation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ThresholdResult {
    /// Whether the vouch count reached the threshold.
    pub approved: bool,
    /// Current vouch count for the `(vouchee, channel)` pair.
    pub count: u32,
    /// The channel's configured threshold.
    pub threshold: u32,
}

// ---------------------------------------------------------------------------
// Vouch operations
// ---------------------------------------------------------------------------

/// Creates, signs, and saves a vouch, refreshing the corresponding
/// join request's vouch count.
pub fn create_vouch(
    keypair: &Keypair,
    vouchee: PublicKey,
    channel_id: &str,
    store: &Database,
) -> Result<Vouch> {
    let vouch = Vouch::create(keypair, vouchee, channel_id, now_millis())?;
    save_vouch(store, &vouch)?;
    Ok(vouch)
}

/// Saves a vouch (idempotent) and recomputes `vouches_received` on the
/// join request. Returns the refreshed count.
///
/// The caller must have verified the signature; this function persists
/// unconditionally.
pub fn save_vouch(store: &Database, vouch: &Vouch) -> Result<u32> {
    let inserted = store.insert_vouch(vouch)?;
    if !inserted {
        tracing::debug!(
            channel = %vouch.channel_id,
            "duplicate vouch ignored"
        );
    }
    store.refresh_vouch_count(&vouch.vouchee_pub_key.to_hex(), &vouch.channel_id)
}

/// Verifies a vouch signature against its embedded voucher key.
pub fn verify_vouch(vouch: &Vouch) -> Result<()> {
    vouch.verify()
}

// ---------------------------------------------------------------------------
// Join request operations
// ---------------------------------------------------------------------------

/// Records a join request with status `pending` (idempotent).
pub fn create_join_request(store: &Database, requester_hex: &str, channel_id: &str) -> Result<bool> {
    store.create_join_request(requester_hex, channel_id, now_millis())
}

/// Marks a join request approved.
pub fn approve_request(store: &Database, requester_hex: &str, channel_id: &str) -> Result<()> {
    store.set_join_status(requester_hex, channel_id, JoinStatus::Approved)
}

/// All `(voucher, vouchee)` edges recorded for a channel, directional
/// from voucher to vouchee.
pub fn trust_graph(store: &Database, channel_id: &str) -> Result<Vec<(String, String)>> {
    store.trust_edges(channel_id)
}

// ---------------------------------------------------------------------------
// Threshold evaluation
// ---------------------------------------------------------------------------

/// Reads the channel's vouch threshold and the current vouch count for
/// `vouchee`; marks the join request approved when
/// `count >= threshold`.
///
/// Returns `None` when the channel is unknown locally (nothing to
/// evaluate against).
pub fn process_vouch_and_check_threshold(
    store: &Database,
    channels: &ChannelManager,
    vouchee_hex: &str,
    channel_id: &str,
) -> Result<Option<ThresholdResult>> {
    let Some(state) = channels.get(channel_id) else {
        return Ok(None);
    };

    let threshold = state.config.vouch_threshold;
    let count = store.vouch_count(vouchee_hex, channel_id)?;
    let approved = count >= threshold;

    if approved {
        approve_request(store, vouchee_hex, channel_id)?;
        tracing::info!(
            channel = %channel_id,
            count,
            threshold,
            "join request approved"
        );
    }

    Ok(Some(ThresholdResult {
        approved,
        count,
        threshold,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SELF_HEX: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn setup(threshold: u32) -> (Database, ChannelManager) {
        let db = Database::open_in_memory().expect("db");
        let mut manager = ChannelManager::load(&db, SELF_HEX).expect("manager");
        manager
            .create_channel(&db, "general", Some(threshold), Default::default())
            .expect("channel");
        (db, manager)
    }

    #[test]
    fn create_vouch_saves_and_counts() -> Result<()> {
        let (db, _) = setup(2);
        let voucher = Keypair::from_seed(&[1; 32]);
        let vouchee = Keypair::from_seed(&[9; 32]).public_key();

        let vouch = create_vouch(&voucher, vouchee, "general", &db)?;
        verify_vouch(&vouch)?;
        assert_eq!(db.vouch_count(&vouchee.to_hex(), "general")?, 1);
        Ok(())
    }

    #[test]
    fn double_vouch_leaves_count_at_one() -> Result<()> {
        let (db, _) = setup(2);
        let voucher = Keypair::from_seed(&[1; 32]);
        let vouchee = Keypair::from_seed(&[9; 32]).public_key();

        create_vouch(&voucher, vouchee, "general", &db)?;
        create_vouch(&voucher, vouchee, "general", &db)?;
        assert_eq!(db.vouch_count(&vouchee.to_hex(), "general")?, 1);
        Ok(())
    }

    #[test]
    fn threshold_approves_at_exact_count() -> Result<()> {
        let (db, manager) = setup(2);
        let vouchee = Keypair::from_seed(&[9; 32]).public_key();
        let vouchee_hex = vouchee.to_hex();

        create_join_request(&db, &vouchee_hex, "general")?;

        // First vouch: below threshold.
        create_vouch(&Keypair::from_seed(&[1; 32]), vouchee, "general", &db)?;
        let result = process_vouch_and_check_threshold(&db, &manager, &vouchee_hex, "general")?
            .expect("known channel");
        assert!(!result.approved);
        assert_eq!(result.count, 1);
        assert_eq!(result.threshold, 2);

        // Second vouch from a different voucher: approved.
        create_vouch(&Keypair::from_seed(&[2; 32]), vouchee, "general", &db)?;
        let result = process_vouch_and_check_threshold(&db, &manager, &vouchee_hex, "general")?
            .expect("known channel");
        assert!(result.approved);
        assert_eq!(result.count, 2);

        let request = db.get_join_request(&vouchee_hex, "general")?.expect("row");
        assert_eq!(request.status, JoinStatus::Approved);
        assert_eq!(request.vouches_received, 2);
        Ok(())
    }

    #[test]
    fn unknown_channel_yields_none() -> Result<()> {
        let (db, manager) = setup(2);
        let result = process_vouch_and_check_threshold(&db, &manager, &"ff".repeat(32), "nope")?;
        assert!(result.is_none());
        Ok(())
    }

    #[test]
    fn tampered_vouch_fails_verification() -> Result<()> {
        let voucher = Keypair::from_seed(&[1; 32]);
        let vouchee = Keypair::from_seed(&[9; 32]).public_key();

        let mut vouch = Vouch::create(&voucher, vouchee, "general", 42)?;
        vouch.channel_id = "other".into();
        assert!(verify_vouch(&vouch).is_err());
        Ok(())
    }

    #[test]
    fn trust_graph_lists_edges() -> Result<()> {
        let (db, _) = setup(2);
        let voucher = Keypair::from_seed(&[1; 32]);
        let vouchee = Keypair::from_seed(&[9; 32]).public_key();

        let vouch = create_vouch(&voucher, vouchee, "general", &db)?;
        let graph = trust_graph(&db, "general")?;
        assert_eq!(
            graph,
            vec![(vouch.voucher_pub_key.to_hex(), vouch.vouchee_pub_key.to_hex())]
        );
        Ok(())
    }
}
