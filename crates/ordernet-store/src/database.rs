//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and
//! guarantees that migrations have run before any other operation.
//! The connection is used from a single executor; writes are
//! serialized by the node's event loop, not by the store.

use std::path::{Path, PathBuf};

use ordernet_types::{OrdernetError, Result};
use rusqlite::Connection;

use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) a database at an explicit path.
    ///
    /// The parent directory is created if absent (mode `0700` on
    /// Unix). Applies the recommended pragmas (`journal_mode=WAL`,
    /// `foreign_keys=ON`) and runs schema migrations.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            create_data_dir(parent)?;
        }

        tracing::info!(path = %path.display(), "opening database");

        let conn = Connection::open(path).map_err(sql_err)?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(sql_err)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(sql_err)?;

        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    /// Opens an in-memory database. Test-only convenience; the schema
    /// and pragmas match [`open_at`](Self::open_at).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(sql_err)?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Returns a reference to the underlying connection.
    ///
    /// Callers should prefer the typed CRUD helpers; direct access is
    /// occasionally needed for transactions or ad-hoc queries.
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Returns the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }
}

/// Maps a rusqlite error into the central error type.
pub(crate) fn sql_err(e: rusqlite::Error) -> OrdernetError {
    OrdernetError::StorageError {
        reason: e.to_string(),
    }
}

/// Creates the data directory if absent, restricting permissions on
/// Unix so the database (which holds the encrypted identity) is not
/// world-readable.
fn create_data_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)
            .map_err(|e| OrdernetError::StorageError {
                reason: format!("failed to create data directory: {e}"),
            })?;
    }

    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(dir).map_err(|e| OrdernetError::StorageError {
            reason: format!("failed to create data directory: {e}"),
        })?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
