//! Observed peer persistence.
//!
//! Peers are created and refreshed on receipt of valid presence
//! announcements. `first_seen` is kept from the original row on
//! upsert; everything else takes the newer value.

use ordernet_types::{PeerInfo, Result};
use rusqlite::params;

use crate::database::{sql_err, Database};

impl Database {
    /// Inserts or refreshes a peer row.
    pub fn upsert_peer(&self, peer: &PeerInfo) -> Result<()> {
        let multiaddrs = serde_json::to_string(&peer.multiaddrs).unwrap_or_else(|_| "[]".into());

        self.conn()
            .execute(
                "INSERT INTO peers (public_key, nickname, first_seen, last_seen, multiaddrs)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(public_key) DO UPDATE SET
                    nickname = excluded.nickname,
                    last_seen = excluded.last_seen,
                    multiaddrs = excluded.multiaddrs",
                params![
                    peer.pubkey.to_lowercase(),
                    peer.nickname,
                    peer.first_seen,
                    peer.last_seen,
                    multiaddrs,
                ],
            )
            .map_err(sql_err)?;
        Ok(())
    }

    /// Fetches a peer by its lowercase hex public key.
    pub fn get_peer(&self, pubkey: &str) -> Result<Option<PeerInfo>> {
        let result = self.conn().query_row(
            "SELECT public_key, nickname, first_seen, last_seen, multiaddrs
             FROM peers WHERE public_key = ?1",
            params![pubkey.to_lowercase()],
            row_to_peer,
        );

        match result {
            Ok(peer) => Ok(Some(peer)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(sql_err(e)),
        }
    }

    /// Lists all known peers, most recently seen first. Administrative
    /// listing; not used on the protocol paths.
    pub fn list_peers(&self) -> Result<Vec<PeerInfo>> {
        let mut stmt = self
            .conn()
            .prepare(
                "SELECT public_key, nickname, first_seen, last_seen, multiaddrs
                 FROM peers ORDER BY last_seen DESC",
            )
            .map_err(sql_err)?;
        let rows = stmt.query_map([], row_to_peer).map_err(sql_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(sql_err)
    }
}

fn row_to_peer(row: &rusqlite::Row<'_>) -> rusqlite::Result<PeerInfo> {
    let multiaddrs_json: String = row.get(4)?;
    let multiaddrs: Vec<String> = serde_json::from_str(&multiaddrs_json).unwrap_or_default();

    Ok(PeerInfo {
        pubkey: row.get(0)?,
        nickname: row.get(1)?,
        first_seen: row.get(2)?,
        last_seen: row.get(3)?,
        multiaddrs,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
