//! Channel persistence.
//!
//! The durable copy of each channel's config and group key. The
//! in-memory channel manager is repopulated from these rows on start
//! and writes back through them on every mutation.

use std::collections::BTreeSet;
use std::str::FromStr;

use ordernet_crypto::keys::GroupKey;
use ordernet_types::{AccessMode, ChannelConfig, Result};
use rusqlite::params;

use crate::database::{sql_err, Database};

impl Database {
    /// Inserts or replaces a channel row.
    pub fn upsert_channel(&self, config: &ChannelConfig, group_key: &GroupKey) -> Result<()> {
        let allowed_members = serde_json::to_string(
            &config.allowed_members.iter().cloned().collect::<Vec<_>>(),
        )
        .unwrap_or_else(|_| "[]".into());

        self.conn()
            .execute(
                "INSERT OR REPLACE INTO channels
                    (id, name, creator_pubkey, vouch_threshold, created_at,
                     group_key, access_mode, invite_only, allowed_members)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    config.id,
                    config.name,
                    config.creator_pubkey.to_lowercase(),
                    config.vouch_threshold,
                    config.created_at,
                    group_key.as_bytes().as_slice(),
                    config.access_mode.to_string(),
                    config.invite_only as i64,
                    allowed_members,
                ],
            )
            .map_err(sql_err)?;
        Ok(())
    }

    /// Fetches a channel and its group key by id.
    pub fn get_channel(&self, id: &str) -> Result<Option<(ChannelConfig, GroupKey)>> {
        let result = self.conn().query_row(
            "SELECT id, name, creator_pubkey, vouch_threshold, created_at,
                    group_key, access_mode, invite_only, allowed_members
             FROM channels WHERE id = ?1",
            params![id],
            row_to_channel,
        );

        match result {
            Ok(pair) => Ok(Some(pair)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(sql_err(e)),
        }
    }

    /// Lists every stored channel with its group key.
    pub fn list_channels(&self) -> Result<Vec<(ChannelConfig, GroupKey)>> {
        let mut stmt = self
            .conn()
            .prepare(
                "SELECT id, name, creator_pubkey, vouch_threshold, created_at,
                        group_key, access_mode, invite_only, allowed_members
                 FROM channels ORDER BY created_at ASC",
            )
            .map_err(sql_err)?;
        let rows = stmt.query_map([], row_to_channel).map_err(sql_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(sql_err)
    }

    /// Deletes a channel (and, via the foreign key, its messages).
    /// Returns whether a row was removed.
    pub fn delete_channel(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM channels WHERE id = ?1", params![id])
            .map_err(sql_err)?;
        Ok(affected > 0)
    }
}

fn row_to_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<(ChannelConfig, GroupKey)> {
    let group_key_blob: Vec<u8> = row.get(5)?;
    let group_key = GroupKey::from_slice(&group_key_blob).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Blob,
            e.to_string().into(),
        )
    })?;

    let access_mode_str: String = row.get(6)?;
    let access_mode = AccessMode::from_str(&access_mode_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            e.to_string().into(),
        )
    })?;

    let allowed_json: Option<String> = row.get(8)?;
    let allowed_members: BTreeSet<String> = allowed_json
        .as_deref()
        .and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
        .into_iter()
        .map(|m| m.to_lowercase())
        .collect();

    let config = ChannelConfig {
        id: row.get(0)?,
        name: row.get(1)?,
        creator_pubkey: row.get(2)?,
        vouch_threshold: row.get(3)?,
        created_at: row.get(4)?,
        access_mode,
        invite_only: row.get::<_, i64>(7)? != 0,
        allowed_members,
    };

    Ok((config, group_key))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_channel(id: &str) -> (ChannelConfig, GroupKey) {
        let mut allowed = BTreeSet::new();
        allowed.insert("aa".repeat(32));
        let config = ChannelConfig {
            id: id.into(),
            name: format!("#{id}"),
            creator_pubkey: "aa".repeat(32),
            vouch_threshold: 2,
            created_at: 1_700_000_000_000,
            access_mode: AccessMode::Private,
            invite_only: true,
            allowed_members: allowed,
        };
        (config, GroupKey::generate())
    }

    #[test]
    fn upsert_then_get_roundtrip() -> Result<()> {
        let db = Database::open_in_memory()?;
        let (config, key) = sample_channel("team");
        db.upsert_channel(&config, &key)?;

        let (loaded, loaded_key) = db.get_channel("team")?.expect("channel row");
        assert_eq!(loaded, config);
        assert_eq!(loaded_key.as_bytes(), key.as_bytes());
        Ok(())
    }

    #[test]
    fn upsert_replaces_existing() -> Result<()> {
        let db = Database::open_in_memory()?;
        let (mut config, key) = sample_channel("team");
        db.upsert_channel(&config, &key)?;

        config.invite_only = false;
        config.allowed_members.insert("bb".repeat(32));
        db.upsert_channel(&config, &key)?;

        let (loaded, _) = db.get_channel("team")?.expect("channel row");
        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn unknown_channel_is_none() -> Result<()> {
        let db = Database::open_in_memory()?;
        assert!(db.get_channel("nope")?.is_none());
        Ok(())
    }

    #[test]
    fn list_orders_by_creation() -> Result<()> {
        let db = Database::open_in_memory()?;
        let (mut older, key_a) = sample_channel("older");
        older.created_at = 100;
        let (mut newer, key_b) = sample_channel("newer");
        newer.created_at = 200;

        db.upsert_channel(&newer, &key_b)?;
        db.upsert_channel(&older, &key_a)?;

        let channels = db.list_channels()?;
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].0.id, "older");
        Ok(())
    }

    #[test]
    fn delete_removes_row() -> Result<()> {
        let db = Database::open_in_memory()?;
        let (config, key) = sample_channel("gone");
        db.upsert_channel(&config, &key)?;

        assert!(db.delete_channel("gone")?);
        assert!(!db.delete_channel("gone")?);
        assert!(db.get_channel("gone")?.is_none());
        Ok(())
    }
}
