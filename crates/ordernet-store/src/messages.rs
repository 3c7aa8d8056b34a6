//! Message history persistence.
//!
//! Messages are stored in their encrypted wire form, keyed by the
//! globally unique `message_id`. Insertion is `INSERT OR IGNORE`, so
//! the gossip layer's redeliveries are harmless, and `exists` backs
//! the receive path's dedup check.

use ordernet_crypto::aead::AeadNonce;
use ordernet_crypto::signing::{PublicKey, Signature};
use ordernet_proto::chat::EncryptedMessage;
use rusqlite::params;

use ordernet_types::Result;

use crate::database::{sql_err, Database};

impl Database {
    /// Inserts a message if its id is unseen. Returns whether a row
    /// was actually written.
    pub fn insert_message(&self, message: &EncryptedMessage) -> Result<bool> {
        let affected = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO messages
                    (message_id, channel_id, sender_pubkey, nonce, ciphertext, signature, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    message.message_id,
                    message.channel_id,
                    message.sender_pub_key.to_hex(),
                    message.nonce.as_bytes().as_slice(),
                    message.ciphertext,
                    message.signature.as_bytes().as_slice(),
                    message.timestamp,
                ],
            )
            .map_err(sql_err)?;
        Ok(affected > 0)
    }

    /// Point lookup backing the receive path's dedup check.
    pub fn message_exists(&self, message_id: &str) -> Result<bool> {
        let count: i64 = self
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM messages WHERE message_id = ?1",
                params![message_id],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        Ok(count > 0)
    }

    /// Returns up to `limit` messages for a channel in timestamp
    /// order, oldest first.
    pub fn channel_history(&self, channel_id: &str, limit: u32) -> Result<Vec<EncryptedMessage>> {
        let mut stmt = self
            .conn()
            .prepare(
                "SELECT message_id, channel_id, sender_pubkey, nonce, ciphertext, signature, timestamp
                 FROM messages
                 WHERE channel_id = ?1
                 ORDER BY timestamp ASC
                 LIMIT ?2",
            )
            .map_err(sql_err)?;

        let rows = stmt
            .query_map(params![channel_id, limit], row_to_message)
            .map_err(sql_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(sql_err)
    }

    /// Total message count for a channel.
    pub fn message_count(&self, channel_id: &str) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM messages WHERE channel_id = ?1",
                params![channel_id],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        Ok(count as u64)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<EncryptedMessage> {
    let sender_hex: String = row.get(2)?;
    let sender_pub_key = PublicKey::from_hex(&sender_hex).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            e.to_string().into(),
        )
    })?;

    let nonce_blob: Vec<u8> = row.get(3)?;
    let nonce = AeadNonce::from_slice(&nonce_blob).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Blob,
            e.to_string().into(),
        )
    })?;

    let signature_blob: Vec<u8> = row.get(5)?;
    if signature_blob.len() != Signature::LEN {
        return Err(rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Blob,
            format!("expected {} byte signature, got {}", Signature::LEN, signature_blob.len())
                .into(),
        ));
    }
    let mut signature_bytes = [0u8; 64];
    signature_bytes.copy_from_slice(&signature_blob);

    Ok(EncryptedMessage {
        message_id: row.get(0)?,
        channel_id: row.get(1)?,
        sender_pub_key,
        nonce,
        ciphertext: row.get(4)?,
        signature: Signature::from_bytes(signature_bytes),
        timestamp: row.get(6)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
