// Sealstore — Primary object repository
//
// Primary objects are the hardware-backed root keys sealed material chains
// from. The persisted handle blob is opaque here: it goes straight to the
// hardware abstraction for deserialization and is never interpreted.

use rusqlite::{params, OptionalExtension};
use zeroize::Zeroizing;

use super::db::Database;
use super::models::{IdentitySource, PrimaryObject};
use super::StoreError;
use crate::hsm::Hsm;

pub struct PrimaryObjectRepository<'a> {
    db: &'a Database,
}

impl<'a> PrimaryObjectRepository<'a> {
    /// Identities are assigned by the store at insert.
    pub const IDENTITY: IdentitySource = IdentitySource::StoreAssigned;

    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Load exactly one primary object by identity.
    ///
    /// Absence is an error, not a miss: every persisted token must resolve
    /// its primary. The handle blob is handed unmodified to `hsm`.
    pub fn load(&self, id: u32, hsm: &dyn Hsm) -> Result<PrimaryObject, StoreError> {
        let row: Option<(String, Vec<u8>, String)> = self
            .db
            .conn()
            .query_row(
                "SELECT hierarchy, handle, objauth FROM pobjects WHERE id=?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let (hierarchy, handle_blob, objauth) =
            row.ok_or_else(|| StoreError::NotFound(format!("primary object {id}")))?;

        if handle_blob.is_empty() {
            return Err(StoreError::Malformed(format!(
                "primary object {id} has an empty handle blob"
            )));
        }

        let handle = hsm.deserialize_handle(&handle_blob)?;

        Ok(PrimaryObject {
            id,
            hierarchy,
            handle,
            objauth: Zeroizing::new(objauth),
        })
    }

    /// Insert a new primary object around a serialized handle, under the
    /// fixed owner hierarchy with a placeholder authorization value.
    /// Returns the store-assigned identity.
    pub fn add(&self, handle_blob: &[u8]) -> Result<u32, StoreError> {
        let tx = self.db.transaction()?;

        tx.execute(
            "INSERT INTO pobjects (hierarchy, handle, objauth) VALUES (?1, ?2, ?3)",
            params!["o", handle_blob, ""],
        )?;

        let id = assigned_id(tx.last_insert_rowid())?;
        tx.commit()?;

        tracing::info!(pid = id, "primary object stored");
        Ok(id)
    }

    /// The lowest persisted primary object identity, if any. Provisioning
    /// uses this to chain a new token from an existing primary.
    pub fn first_id(&self) -> Result<Option<u32>, StoreError> {
        let id: Option<i64> = self
            .db
            .conn()
            .query_row(
                "SELECT id FROM pobjects ORDER BY id ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        id.map(assigned_id).transpose()
    }
}

/// Validate a rowid the engine just assigned.
pub(crate) fn assigned_id(rowid: i64) -> Result<u32, StoreError> {
    if rowid == 0 {
        return Err(StoreError::Integrity("engine assigned rowid 0".into()));
    }
    u32::try_from(rowid)
        .map_err(|_| StoreError::Integrity(format!("assigned rowid {rowid} exceeds identity range")))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
