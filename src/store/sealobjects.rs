// Sealstore — Seal object repository
//
// One seal object per initialized token: the Security-Officer credential
// line is always complete, the User line may be partially or wholly absent
// until a user PIN is set. The only mutation is the pin-rotation protocol.

use rusqlite::params;

use super::db::Database;
use super::models::{Role, SealObject};
use super::StoreError;

pub struct SealObjectRepository<'a> {
    db: &'a Database,
}

impl<'a> SealObjectRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Load the seal object for a token. An initialized token without a seal
    /// row is a fatal inconsistency for that token's load.
    pub fn load(&self, tokid: u32) -> Result<SealObject, StoreError> {
        let mut stmt = self
            .db
            .conn()
            .prepare("SELECT * FROM sealobjects WHERE tokid=?1")?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut rows = stmt.query(params![tokid])?;
        let row = match rows.next()? {
            Some(row) => row,
            None => {
                return Err(StoreError::NotFound(format!(
                    "seal object for token {tokid}"
                )))
            }
        };

        let mut id: Option<u32> = None;
        let mut userpub: Option<Vec<u8>> = None;
        let mut userpriv: Option<Vec<u8>> = None;
        let mut userauthsalt: Option<String> = None;
        let mut sopub: Option<Vec<u8>> = None;
        let mut sopriv: Option<Vec<u8>> = None;
        let mut soauthsalt: Option<String> = None;

        for (i, name) in columns.iter().enumerate() {
            match name.as_str() {
                "id" => id = Some(row.get(i)?),
                // The token already carries its own identity.
                "tokid" => {}
                "userpub" => userpub = opt_blob(row.get(i)?),
                "userpriv" => userpriv = opt_blob(row.get(i)?),
                "userauthsalt" => userauthsalt = row.get(i)?,
                "sopub" => sopub = row.get(i)?,
                "sopriv" => sopriv = row.get(i)?,
                "soauthsalt" => soauthsalt = row.get(i)?,
                other => {
                    return Err(StoreError::Malformed(format!(
                        "unrecognized sealobjects column: {other}"
                    )))
                }
            }
        }

        Ok(SealObject {
            id: required(id, "id")?,
            userpub,
            userpriv,
            userauthsalt,
            sopub: required_blob(sopub, "sopub")?,
            sopriv: required_blob(sopriv, "sopriv")?,
            soauthsalt: required(soauthsalt, "soauthsalt")?,
        })
    }

    /// Pin rotation: rewrite the salt and private blob for one role, and the
    /// public blob only when new key material was generated.
    ///
    /// A pin change always re-derives and re-wraps the private authorization
    /// material; the public half only changes when the caller supplies one.
    /// Callers must not invoke concurrent rotations for the same token.
    pub fn rotate(
        &self,
        tokid: u32,
        role: Role,
        new_salt: &str,
        new_priv: &[u8],
        new_pub: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        let tx = self.db.transaction()?;

        let updated = match (role, new_pub) {
            (Role::SecurityOfficer, Some(new_pub)) => tx.execute(
                "UPDATE sealobjects SET soauthsalt=?1, sopriv=?2, sopub=?3 WHERE tokid=?4",
                params![new_salt, new_priv, new_pub, tokid],
            )?,
            (Role::SecurityOfficer, None) => tx.execute(
                "UPDATE sealobjects SET soauthsalt=?1, sopriv=?2 WHERE tokid=?3",
                params![new_salt, new_priv, tokid],
            )?,
            (Role::User, Some(new_pub)) => tx.execute(
                "UPDATE sealobjects SET userauthsalt=?1, userpriv=?2, userpub=?3 WHERE tokid=?4",
                params![new_salt, new_priv, new_pub, tokid],
            )?,
            (Role::User, None) => tx.execute(
                "UPDATE sealobjects SET userauthsalt=?1, userpriv=?2 WHERE tokid=?3",
                params![new_salt, new_priv, tokid],
            )?,
        };

        if updated == 0 {
            return Err(StoreError::NotFound(format!(
                "seal object for token {tokid}"
            )));
        }

        tx.commit()?;

        tracing::info!(tokid, ?role, new_public = new_pub.is_some(), "pin rotated");
        Ok(())
    }
}

/// Empty blobs persisted by older writers mean "absent" for optional
/// columns.
fn opt_blob(value: Option<Vec<u8>>) -> Option<Vec<u8>> {
    value.filter(|b| !b.is_empty())
}

fn required<T>(value: Option<T>, column: &str) -> Result<T, StoreError> {
    value.ok_or_else(|| StoreError::Malformed(format!("sealobjects row is missing {column}")))
}

fn required_blob(value: Option<Vec<u8>>, column: &str) -> Result<Vec<u8>, StoreError> {
    required(opt_blob(value), column)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
