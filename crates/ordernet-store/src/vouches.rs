//! Vouch persistence.
//!
//! The composite primary key `(voucher, vouchee, channel)` combined
//! with `INSERT OR IGNORE` makes double-vouching a no-op: a voucher
//! counts once per vouchee per channel, however many times the wire
//! message is replayed.

use ordernet_proto::vouch::Vouch;
use rusqlite::params;

use ordernet_types::Result;

use crate::database::{sql_err, Database};

impl Database {
    /// Inserts a vouch if the `(voucher, vouchee, channel)` triple is
    /// unseen. Returns whether a row was actually written.
    pub fn insert_vouch(&self, vouch: &Vouch) -> Result<bool> {
        let affected = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO vouches
                    (voucher_pubkey, vouchee_pubkey, channel_id, timestamp, signature)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    vouch.voucher_pub_key.to_hex(),
                    vouch.vouchee_pub_key.to_hex(),
                    vouch.channel_id,
                    vouch.timestamp,
                    vouch.signature.as_bytes().as_slice(),
                ],
            )
            .map_err(sql_err)?;
        Ok(affected > 0)
    }

    /// Number of distinct vouchers for `(vouchee, channel)`.
    pub fn vouch_count(&self, vouchee_pubkey: &str, channel_id: &str) -> Result<u32> {
        let count: i64 = self
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM vouches
                 WHERE vouchee_pubkey = ?1 AND channel_id = ?2",
                params![vouchee_pubkey.to_lowercase(), channel_id],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        Ok(count as u32)
    }

    /// All `(voucher, vouchee)` hex pairs recorded for a channel.
    /// Edges are directional from voucher to vouchee.
    pub fn trust_edges(&self, channel_id: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn()
            .prepare(
                "SELECT voucher_pubkey, vouchee_pubkey FROM vouches
                 WHERE channel_id = ?1 ORDER BY timestamp ASC",
            )
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![channel_id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .map_err(sql_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(sql_err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ordernet_crypto::signing::Keypair;

    fn make_vouch(voucher_seed: u8, vouchee_seed: u8, channel: &str) -> Vouch {
        let voucher = Keypair::from_seed(&[voucher_seed; 32]);
        let vouchee = Keypair::from_seed(&[vouchee_seed; 32]).public_key();
        Vouch::create(&voucher, vouchee, channel, 42).expect("vouch")
    }

    #[test]
    fn insert_and_count() -> Result<()> {
        let db = Database::open_in_memory()?;
        let vouch = make_vouch(1, 2, "general");
        let vouchee_hex = vouch.vouchee_pub_key.to_hex();

        assert!(db.insert_vouch(&vouch)?);
        assert_eq!(db.vouch_count(&vouchee_hex, "general")?, 1);
        assert_eq!(db.vouch_count(&vouchee_hex, "other")?, 0);
        Ok(())
    }

    #[test]
    fn double_vouch_is_noop() -> Result<()> {
        let db = Database::open_in_memory()?;
        let vouch = make_vouch(1, 2, "general");
        let vouchee_hex = vouch.vouchee_pub_key.to_hex();

        assert!(db.insert_vouch(&vouch)?);
        assert!(!db.insert_vouch(&vouch)?);
        assert_eq!(db.vouch_count(&vouchee_hex, "general")?, 1);
        Ok(())
    }

    #[test]
    fn distinct_vouchers_accumulate() -> Result<()> {
        let db = Database::open_in_memory()?;
        let first = make_vouch(1, 9, "general");
        let second = make_vouch(2, 9, "general");
        let vouchee_hex = first.vouchee_pub_key.to_hex();

        db.insert_vouch(&first)?;
        db.insert_vouch(&second)?;
        assert_eq!(db.vouch_count(&vouchee_hex, "general")?, 2);
        Ok(())
    }

    #[test]
    fn same_voucher_different_channels_counts_separately() -> Result<()> {
        let db = Database::open_in_memory()?;
        let in_general = make_vouch(1, 9, "general");
        let in_team = make_vouch(1, 9, "team");
        let vouchee_hex = in_general.vouchee_pub_key.to_hex();

        db.insert_vouch(&in_general)?;
        db.insert_vouch(&in_team)?;
        assert_eq!(db.vouch_count(&vouchee_hex, "general")?, 1);
        assert_eq!(db.vouch_count(&vouchee_hex, "team")?, 1);
        Ok(())
    }

    #[test]
    fn trust_edges_are_directional() -> Result<()> {
        let db = Database::open_in_memory()?;
        let vouch = make_vouch(1, 2, "general");
        db.insert_vouch(&vouch)?;

        let edges = db.trust_edges("general")?;
        assert_eq!(
            edges,
            vec![(vouch.voucher_pub_key.to_hex(), vouch.vouchee_pub_key.to_hex())]
        );
        Ok(())
    }
}
