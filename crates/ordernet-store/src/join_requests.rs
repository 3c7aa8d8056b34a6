//! Join request persistence.
//!
//! One row per `(requester, channel)`. Creation is `INSERT OR IGNORE`
//! so a re-sent join request never resets an in-flight vouch count.

use std::str::FromStr;

use ordernet_types::{JoinRequest, JoinStatus, Result};
use rusqlite::params;

use crate::database::{sql_err, Database};

impl Database {
    /// Records a join request if none exists yet for the pair.
    /// Returns whether a row was actually written.
    pub fn create_join_request(
        &self,
        requester_pubkey: &str,
        channel_id: &str,
        timestamp: i64,
    ) -> Result<bool> {
        let affected = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO join_requests
                    (requester_pubkey, channel_id, timestamp, vouches_received, status)
                 VALUES (?1, ?2, ?3, 0, 'pending')",
                params![requester_pubkey.to_lowercase(), channel_id, timestamp],
            )
            .map_err(sql_err)?;
        Ok(affected > 0)
    }

    /// Fetches a join request by its composite key.
    pub fn get_join_request(
        &self,
        requester_pubkey: &str,
        channel_id: &str,
    ) -> Result<Option<JoinRequest>> {
        let result = self.conn().query_row(
            "SELECT requester_pubkey, channel_id, timestamp, vouches_received, status
             FROM join_requests
             WHERE requester_pubkey = ?1 AND channel_id = ?2",
            params![requester_pubkey.to_lowercase(), channel_id],
            row_to_join_request,
        );

        match result {
            Ok(request) => Ok(Some(request)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(sql_err(e)),
        }
    }

    /// Updates the status of a join request.
    pub fn set_join_status(
        &self,
        requester_pubkey: &str,
        channel_id: &str,
        status: JoinStatus,
    ) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE join_requests SET status = ?3
                 WHERE requester_pubkey = ?1 AND channel_id = ?2",
                params![
                    requester_pubkey.to_lowercase(),
                    channel_id,
                    status.to_string()
                ],
            )
            .map_err(sql_err)?;
        Ok(())
    }

    /// Recomputes `vouches_received` from the vouch table.
    pub fn refresh_vouch_count(&self, requester_pubkey: &str, channel_id: &str) -> Result<u32> {
        let count = self.vouch_count(requester_pubkey, channel_id)?;
        self.conn()
            .execute(
                "UPDATE join_requests SET vouches_received = ?3
                 WHERE requester_pubkey = ?1 AND channel_id = ?2",
                params![requester_pubkey.to_lowercase(), channel_id, count],
            )
            .map_err(sql_err)?;
        Ok(count)
    }

    /// Lists all join requests for a channel, oldest first.
    /// Administrative listing.
    pub fn list_join_requests(&self, channel_id: &str) -> Result<Vec<JoinRequest>> {
        let mut stmt = self
            .conn()
            .prepare(
                "SELECT requester_pubkey, channel_id, timestamp, vouches_received, status
                 FROM join_requests WHERE channel_id = ?1 ORDER BY timestamp ASC",
            )
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![channel_id], row_to_join_request)
            .map_err(sql_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(sql_err)
    }
}

fn row_to_join_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<JoinRequest> {
    let status_str: String = row.get(4)?;
    let status = JoinStatus::from_str(&status_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            e.to_string().into(),
        )
    })?;

    Ok(JoinRequest {
        requester_pubkey: row.get(0)?,
        channel_id: row.get(1)?,
        timestamp: row.get(2)?,
        vouches_received: row.get(3)?,
        status,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ordernet_crypto::signing::Keypair;
    use ordernet_proto::vouch::Vouch;

    #[test]
    fn create_then_get_roundtrip() -> Result<()> {
        let db = Database::open_in_memory()?;
        let requester = "ab".repeat(32);

        assert!(db.create_join_request(&requester, "general", 100)?);
        let request = db.get_join_request(&requester, "general")?.expect("row");
        assert_eq!(request.status, JoinStatus::Pending);
        assert_eq!(request.vouches_received, 0);
        assert_eq!(request.timestamp, 100);
        Ok(())
    }

    #[test]
    fn duplicate_create_is_ignored() -> Result<()> {
        let db = Database::open_in_memory()?;
        let requester = "ab".repeat(32);

        assert!(db.create_join_request(&requester, "general", 100)?);
        assert!(!db.create_join_request(&requester, "general", 999)?);

        let request = db.get_join_request(&requester, "general")?.expect("row");
        assert_eq!(request.timestamp, 100);
        Ok(())
    }

    #[test]
    fn status_transition_persists() -> Result<()> {
        let db = Database::open_in_memory()?;
        let requester = "ab".repeat(32);
        db.create_join_request(&requester, "general", 100)?;

        db.set_join_status(&requester, "general", JoinStatus::Approved)?;
        let request = db.get_join_request(&requester, "general")?.expect("row");
        assert_eq!(request.status, JoinStatus::Approved);
        Ok(())
    }

    #[test]
    fn refresh_vouch_count_reads_vouch_table() -> Result<()> {
        let db = Database::open_in_memory()?;

        let vouchee = Keypair::from_seed(&[9; 32]).public_key();
        let vouchee_hex = vouchee.to_hex();
        db.create_join_request(&vouchee_hex, "general", 100)?;

        for seed in [1u8, 2] {
            let voucher = Keypair::from_seed(&[seed; 32]);
            let vouch = Vouch::create(&voucher, vouchee, "general", 42).expect("vouch");
            db.insert_vouch(&vouch)?;
        }

        let count = db.refresh_vouch_count(&vouchee_hex, "general")?;
        assert_eq!(count, 2);

        let request = db.get_join_request(&vouchee_hex, "general")?.expect("row");
        assert_eq!(request.vouches_received, 2);
        Ok(())
    }

    #[test]
    fn list_is_scoped_to_channel() -> Result<()> {
        let db = Database::open_in_memory()?;
        db.create_join_request(&"aa".repeat(32), "general", 100)?;
        db.create_join_request(&"bb".repeat(32), "general", 200)?;
        db.create_join_request(&"cc".repeat(32), "team", 300)?;

        let requests = db.list_join_requests("general")?;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].timestamp, 100);
        Ok(())
    }
}
