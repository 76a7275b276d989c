// Sealstore — Database Management
//
// Owns the one SQLite connection for a store. The handle is an explicit
// value constructed at startup and passed to each repository — there is no
// process-wide singleton, so tests run against independent in-memory stores.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, Transaction};

use super::paths::{Purpose, StorePaths};
use super::schema;
use super::StoreError;

/// A live store handle.
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Locate the store (existing first, then a creatable location), open
    /// it, and bring it to the current schema version.
    ///
    /// This is the full startup sequence: path resolution, advisory lock,
    /// backup, migration, idempotent table creation.
    pub fn discover(paths: &StorePaths) -> Result<Self, StoreError> {
        let path = match paths.resolve(Purpose::FindExisting) {
            Ok(p) => p,
            Err(StoreError::StoreNotFound(_)) => paths.resolve(Purpose::CreateNew)?,
            Err(e) => return Err(e),
        };
        Self::open(&path)
    }

    /// Open (or create) the store at a known path and bring it to the
    /// current schema version.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        tracing::debug!(path = %path.display(), "opening store");
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        schema::setup(&conn, path)?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// An independent in-memory store at the current schema version.
    /// No discovery, no lock, no backup — nothing on disk to protect.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::create_current(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// The on-disk location, if this store is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin one transaction. Commit is explicit; dropping the value rolls
    /// back whatever ran, and a rollback failure is the engine's to log —
    /// it never replaces the error that caused the unwind.
    pub fn transaction(&self) -> Result<Transaction<'_>, StoreError> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Release the handle. Surfaces close failures instead of dropping them
    /// on the floor.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| {
            tracing::error!(error = %e, "could not close store");
            StoreError::Database(e)
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
