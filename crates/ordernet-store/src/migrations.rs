//! Database schema and forward-only migrations.
//!
//! The base schema is applied with `CREATE TABLE IF NOT EXISTS`, then
//! the access-control columns are added to `channels` with
//! `ALTER TABLE … ADD COLUMN`. Both steps are idempotent: pre-existing
//! tables and "duplicate column name" failures are silently absorbed,
//! any other error is fatal.

use ordernet_types::{OrdernetError, Result};
use rusqlite::Connection;

use crate::database::sql_err;

/// Base schema. `messages.channel_id` references `channels(id)` so
/// history disappears with its channel; indices back the protocols'
/// dedup lookup and bounded history scans.
const BASE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS identity (
    id              INTEGER PRIMARY KEY CHECK (id = 1),
    public_key      BLOB NOT NULL,      -- 32 bytes, Ed25519
    private_key_enc BLOB NOT NULL,      -- XChaCha20-Poly1305 sealed seed
    salt            BLOB NOT NULL,      -- 16 bytes, Argon2id salt
    nonce           BLOB NOT NULL,      -- 24 bytes, AEAD nonce
    nickname        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS peers (
    public_key  TEXT PRIMARY KEY,       -- lowercase hex
    nickname    TEXT NOT NULL,
    first_seen  INTEGER NOT NULL,       -- Unix ms
    last_seen   INTEGER NOT NULL,       -- Unix ms
    multiaddrs  TEXT NOT NULL           -- JSON array of strings
);

CREATE TABLE IF NOT EXISTS channels (
    id              TEXT PRIMARY KEY,   -- name without '#'
    name            TEXT NOT NULL,
    creator_pubkey  TEXT NOT NULL,      -- lowercase hex
    vouch_threshold INTEGER NOT NULL DEFAULT 2,
    created_at      INTEGER NOT NULL,   -- Unix ms
    group_key       BLOB NOT NULL       -- 32 bytes
);

CREATE TABLE IF NOT EXISTS messages (
    message_id    TEXT NOT NULL UNIQUE, -- hex of 16 random bytes
    channel_id    TEXT NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
    sender_pubkey TEXT NOT NULL,        -- lowercase hex
    nonce         BLOB NOT NULL,        -- 24 bytes
    ciphertext    BLOB NOT NULL,
    signature     BLOB NOT NULL,        -- 64 bytes
    timestamp     INTEGER NOT NULL      -- sender-claimed, Unix ms
);

CREATE INDEX IF NOT EXISTS idx_messages_channel_ts ON messages(channel_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_id ON messages(message_id);

CREATE TABLE IF NOT EXISTS vouches (
    voucher_pubkey TEXT NOT NULL,       -- lowercase hex
    vouchee_pubkey TEXT NOT NULL,       -- lowercase hex
    channel_id     TEXT NOT NULL,
    timestamp      INTEGER NOT NULL,    -- Unix ms
    signature      BLOB NOT NULL,       -- 64 bytes
    PRIMARY KEY (voucher_pubkey, vouchee_pubkey, channel_id)
);

CREATE TABLE IF NOT EXISTS join_requests (
    requester_pubkey TEXT NOT NULL,     -- lowercase hex
    channel_id       TEXT NOT NULL,
    timestamp        INTEGER NOT NULL,  -- Unix ms
    vouches_received INTEGER NOT NULL DEFAULT 0,
    status           TEXT NOT NULL DEFAULT 'pending',
    PRIMARY KEY (requester_pubkey, channel_id)
);
"#;

/// Forward-only column additions for the access-control fields.
const COLUMN_MIGRATIONS: &[&str] = &[
    "ALTER TABLE channels ADD COLUMN access_mode TEXT NOT NULL DEFAULT 'public'",
    "ALTER TABLE channels ADD COLUMN invite_only INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE channels ADD COLUMN allowed_members TEXT",
];

/// Initializes or migrates the database schema. Idempotent.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(BASE_SCHEMA).map_err(sql_err)?;

    for statement in COLUMN_MIGRATIONS {
        match conn.execute(statement, []) {
            Ok(_) => {}
            Err(e) if is_duplicate_column(&e) => {
                tracing::debug!(statement, "column already present, skipping");
            }
            Err(e) => {
                return Err(OrdernetError::StorageError {
                    reason: format!("migration failed: {e}"),
                });
            }
        }
    }

    Ok(())
}

/// Whether the error is SQLite's "duplicate column name" complaint.
fn is_duplicate_column(e: &rusqlite::Error) -> bool {
    e.to_string().contains("duplicate column name")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
