//! Identity row persistence.
//!
//! Exactly one identity per node, stored at `id = 1`. The private key
//! seed is sealed with XChaCha20-Poly1305 under an Argon2id-derived
//! key before it reaches this table; the store never sees plaintext
//! key material.

use ordernet_types::{OrdernetError, Result};
use rusqlite::params;

use crate::database::{sql_err, Database};

// ---------------------------------------------------------------------------
// IdentityRow
// ---------------------------------------------------------------------------

/// The stored identity record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IdentityRow {
    /// Ed25519 public key bytes.
    pub public_key: [u8; 32],
    /// Sealed private seed (32 bytes + 16-byte tag).
    pub private_key_enc: Vec<u8>,
    /// Argon2id salt.
    pub salt: [u8; 16],
    /// AEAD nonce used to seal the seed.
    pub nonce: [u8; 24],
    /// Current nickname.
    pub nickname: String,
}

impl Database {
    /// Fetches the identity row, if one exists.
    pub fn get_identity(&self) -> Result<Option<IdentityRow>> {
        let result = self.conn().query_row(
            "SELECT public_key, private_key_enc, salt, nonce, nickname
             FROM identity WHERE id = 1",
            [],
            row_to_identity,
        );

        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(sql_err(e)),
        }
    }

    /// Inserts the identity row. Fails if one already exists.
    pub fn insert_identity(&self, row: &IdentityRow) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO identity (id, public_key, private_key_enc, salt, nonce, nickname)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5)",
                params![
                    row.public_key.as_slice(),
                    row.private_key_enc,
                    row.salt.as_slice(),
                    row.nonce.as_slice(),
                    row.nickname,
                ],
            )
            .map_err(sql_err)?;
        Ok(())
    }

    /// Updates the stored nickname.
    pub fn update_identity_nickname(&self, nickname: &str) -> Result<()> {
        let affected = self
            .conn()
            .execute(
                "UPDATE identity SET nickname = ?1 WHERE id = 1",
                params![nickname],
            )
            .map_err(sql_err)?;
        if affected == 0 {
            return Err(OrdernetError::StorageError {
                reason: "no identity row to update".into(),
            });
        }
        Ok(())
    }
}

fn row_to_identity(row: &rusqlite::Row<'_>) -> rusqlite::Result<IdentityRow> {
    let public_key: Vec<u8> = row.get(0)?;
    let private_key_enc: Vec<u8> = row.get(1)?;
    let salt: Vec<u8> = row.get(2)?;
    let nonce: Vec<u8> = row.get(3)?;
    let nickname: String = row.get(4)?;

    Ok(IdentityRow {
        public_key: fixed(&public_key, 0)?,
        private_key_enc,
        salt: fixed(&salt, 2)?,
        nonce: fixed(&nonce, 3)?,
        nickname,
    })
}

/// Copies a blob column into a fixed-size array, flagging the column
/// index on length mismatch.
fn fixed<const N: usize>(bytes: &[u8], column: usize) -> rusqlite::Result<[u8; N]> {
    if bytes.len() != N {
        return Err(rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Blob,
            format!("expected {N} bytes, got {}", bytes.len()).into(),
        ));
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(bytes);
    Ok(arr)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> IdentityRow {
        IdentityRow {
            public_key: [0x01; 32],
            private_key_enc: vec![0x02; 48],
            salt: [0x03; 16],
            nonce: [0x04; 24],
            nickname: "alice".into(),
        }
    }

    #[test]
    fn fresh_database_has_no_identity() -> Result<()> {
        let db = Database::open_in_memory()?;
        assert!(db.get_identity()?.is_none());
        Ok(())
    }

    #[test]
    fn insert_then_get_roundtrip() -> Result<()> {
        let db = Database::open_in_memory()?;
        let row = sample_row();
        db.insert_identity(&row)?;

        let loaded = db.get_identity()?.expect("identity row");
        assert_eq!(loaded, row);
        Ok(())
    }

    #[test]
    fn second_insert_fails() -> Result<()> {
        let db = Database::open_in_memory()?;
        db.insert_identity(&sample_row())?;
        assert!(db.insert_identity(&sample_row()).is_err());
        Ok(())
    }

    #[test]
    fn nickname_update_persists() -> Result<()> {
        let db = Database::open_in_memory()?;
        db.insert_identity(&sample_row())?;
        db.update_identity_nickname("bob")?;

        let loaded = db.get_identity()?.expect("identity row");
        assert_eq!(loaded.nickname, "bob");
        Ok(())
    }

    #[test]
    fn nickname_update_without_row_fails() -> Result<()> {
        let db = Database::open_in_memory()?;
        assert!(db.update_identity_nickname("bob").is_err());
        Ok(())
    }
}
