// Sealstore — Token object repository
//
// Generic secret/key objects belonging to a token: each row is an attribute
// bag persisted as text through the injected codec, with three well-known
// slots materialized onto the loaded object for fast access.

use rusqlite::params;

use super::db::Database;
use super::models::{attr_type, AttributeBag, IdentitySource, TokenObject};
use super::pobjects::assigned_id;
use super::StoreError;
use crate::codec::AttributeCodec;

pub struct TokenObjectRepository<'a> {
    db: &'a Database,
    codec: &'a dyn AttributeCodec,
}

impl<'a> TokenObjectRepository<'a> {
    /// Identities are assigned by the store at insert.
    pub const IDENTITY: IdentitySource = IdentitySource::StoreAssigned;

    pub fn new(db: &'a Database, codec: &'a dyn AttributeCodec) -> Self {
        Self { db, codec }
    }

    /// Load every object belonging to a token, in row order.
    pub fn load_all(&self, tokid: u32) -> Result<Vec<TokenObject>, StoreError> {
        let mut stmt = self
            .db
            .conn()
            .prepare("SELECT * FROM tobjects WHERE tokid=?1")?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut objects = Vec::new();
        let mut rows = stmt.query(params![tokid])?;
        while let Some(row) = rows.next()? {
            let mut id: Option<u32> = None;
            let mut attrs_text: Option<String> = None;

            for (i, name) in columns.iter().enumerate() {
                match name.as_str() {
                    "id" => id = Some(row.get(i)?),
                    // The token already carries its own identity.
                    "tokid" => {}
                    "attrs" => attrs_text = row.get(i)?,
                    other => {
                        return Err(StoreError::Malformed(format!(
                            "unrecognized tobjects column: {other}"
                        )))
                    }
                }
            }

            let id = id.ok_or_else(|| {
                StoreError::Malformed("tobjects row is missing its identity".into())
            })?;
            let attrs_text = attrs_text.filter(|t| !t.is_empty()).ok_or_else(|| {
                StoreError::Malformed(format!("token object {id} has no attributes"))
            })?;

            let attrs = self.codec.decode(&attrs_text)?;
            objects.push(materialize(id, attrs)?);
        }

        Ok(objects)
    }

    /// Encode and insert a new object, writing the store-assigned identity
    /// back onto it.
    pub fn add(&self, tokid: u32, object: &mut TokenObject) -> Result<u32, StoreError> {
        let attrs_text = self.codec.encode(&object.attrs)?;

        let tx = self.db.transaction()?;
        tx.execute(
            "INSERT INTO tobjects (tokid, attrs) VALUES (?1, ?2)",
            params![tokid, attrs_text],
        )?;

        let id = assigned_id(tx.last_insert_rowid())?;
        tx.commit()?;

        object.id = id;
        tracing::info!(tokid, object_id = id, "token object stored");
        Ok(id)
    }

    /// Delete one object by identity. Deleting an identity with no row is
    /// not an error.
    pub fn delete(&self, id: u32) -> Result<(), StoreError> {
        let tx = self.db.transaction()?;
        tx.execute("DELETE FROM tobjects WHERE id=?1", params![id])?;
        tx.commit()?;

        tracing::info!(object_id = id, "token object deleted");
        Ok(())
    }
}

/// Build the loaded object, pulling the well-known slots out of the bag and
/// enforcing that private material never appears without its public half.
fn materialize(id: u32, attrs: AttributeBag) -> Result<TokenObject, StoreError> {
    let slot = |t: u64| -> Option<Vec<u8>> {
        attrs
            .get(t)
            .filter(|a| !a.value.is_empty())
            .map(|a| a.value.clone())
    };

    let objauth_enc = slot(attr_type::OBJAUTH_ENC);
    let pub_blob = slot(attr_type::PUB_BLOB);
    let priv_blob = slot(attr_type::PRIV_BLOB);

    if priv_blob.is_some() && pub_blob.is_none() {
        return Err(StoreError::Malformed(format!(
            "token object {id} has private material without public material"
        )));
    }

    Ok(TokenObject {
        id,
        attrs,
        objauth_enc,
        pub_blob,
        priv_blob,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
