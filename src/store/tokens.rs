// Sealstore — Token repository
//
// Tokens are the aggregate root: loading one pulls in its primary object
// always, and its seal object and token object collection once initialized.
// Token identities are caller-assigned so an in-memory placeholder keeps its
// identity across persistence; the primary-key constraint rejects a
// duplicate.

use rusqlite::params;

use super::db::Database;
use super::models::{IdentitySource, Token, TokenConfig, LABEL_LEN, MAX_TOKEN_COUNT};
use super::pobjects::PrimaryObjectRepository;
use super::sealobjects::SealObjectRepository;
use super::tobjects::TokenObjectRepository;
use super::StoreError;
use crate::codec::AttributeCodec;
use crate::hsm::Hsm;

pub struct TokenRepository<'a> {
    db: &'a Database,
    hsm: &'a dyn Hsm,
    codec: &'a dyn AttributeCodec,
}

impl<'a> TokenRepository<'a> {
    /// Identities come from the caller, not the store. A known extension
    /// point: a future revision may relax this to store-assigned.
    pub const IDENTITY: IdentitySource = IdentitySource::CallerAssigned;

    pub fn new(db: &'a Database, hsm: &'a dyn Hsm, codec: &'a dyn AttributeCodec) -> Self {
        Self { db, hsm, codec }
    }

    /// Load the complete token graph.
    ///
    /// Every persisted token resolves its primary object eagerly; an
    /// initialized one additionally loads its seal object and its full
    /// object collection. Any nested failure aborts the whole load — there
    /// is no partial-success mode. If no persisted token is uninitialized,
    /// one in-memory placeholder (identity = count + 1) is appended so a
    /// freshly opened store always offers a slot to initialize.
    pub fn load_all(&self) -> Result<Vec<Token>, StoreError> {
        let pobjects = PrimaryObjectRepository::new(self.db);
        let seals = SealObjectRepository::new(self.db);
        let objects = TokenObjectRepository::new(self.db, self.codec);

        let mut stmt = self.db.conn().prepare("SELECT * FROM tokens")?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut tokens: Vec<Token> = Vec::new();
        let mut has_uninitialized = false;

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            if tokens.len() >= MAX_TOKEN_COUNT {
                return Err(StoreError::LimitReached(format!(
                    "store holds more than {MAX_TOKEN_COUNT} tokens"
                )));
            }

            let mut id: Option<u32> = None;
            let mut pid: Option<u32> = None;
            let mut label: Option<String> = None;
            let mut config: Option<TokenConfig> = None;

            for (i, name) in columns.iter().enumerate() {
                match name.as_str() {
                    "id" => id = Some(row.get(i)?),
                    "pid" => pid = Some(row.get(i)?),
                    "label" => label = row.get(i)?,
                    "config" => {
                        let text: String = row.get(i)?;
                        if text.is_empty() {
                            return Err(StoreError::Malformed(
                                "token row has an empty config".into(),
                            ));
                        }
                        config = Some(serde_json::from_str(&text)?);
                    }
                    other => {
                        return Err(StoreError::Malformed(format!(
                            "unrecognized tokens column: {other}"
                        )))
                    }
                }
            }

            let id = id
                .ok_or_else(|| StoreError::Malformed("token row is missing its identity".into()))?;
            let pid = pid
                .ok_or_else(|| StoreError::Malformed("token row is missing its pid".into()))?;
            let config = config
                .ok_or_else(|| StoreError::Malformed("token row is missing its config".into()))?;

            // Persisted tokens always chain from a primary object; the read
            // failing is a fatal inconsistency.
            let primary = pobjects.load(pid, self.hsm)?;

            let mut token = Token {
                id,
                pid,
                label: label.unwrap_or_default(),
                config,
                primary: Some(primary),
                seal: None,
                objects: Vec::new(),
            };

            if token.config.is_initialized {
                token.seal = Some(seals.load(id)?);
                token.objects = objects.load_all(id)?;
            } else {
                has_uninitialized = true;
                tracing::debug!(tokid = id, "token not initialized, skipping nested load");
            }

            tokens.push(token);
        }

        if !has_uninitialized {
            if tokens.len() >= MAX_TOKEN_COUNT {
                return Err(StoreError::LimitReached(format!(
                    "no free token slot, maximum of {MAX_TOKEN_COUNT} reached"
                )));
            }
            let id = u32::try_from(tokens.len()).unwrap_or(u32::MAX) + 1;
            tokens.push(Token::uninitialized(id));
        }

        tracing::debug!(count = tokens.len(), "token graph loaded");
        Ok(tokens)
    }

    /// Persist a token under its caller-assigned identity.
    ///
    /// The row insert and, for an initialized token, its seal object insert
    /// share one transaction: both land or neither does. Trailing pad
    /// spaces are trimmed off the label first.
    pub fn add(&self, token: &Token) -> Result<(), StoreError> {
        if token.id == 0 {
            return Err(StoreError::Integrity("token identity 0 is not valid".into()));
        }

        let label = token.label.trim_end_matches(' ');
        if label.len() > LABEL_LEN {
            return Err(StoreError::Malformed(format!(
                "token label exceeds {LABEL_LEN} bytes"
            )));
        }

        let config = serde_json::to_string(&token.config)?;

        let tx = self.db.transaction()?;

        tx.execute(
            "INSERT INTO tokens (id, pid, label, config) VALUES (?1, ?2, ?3, ?4)",
            params![token.id, token.pid, label, config],
        )?;

        // The engine must have honored the caller-assigned identity.
        let assigned = tx.last_insert_rowid();
        if assigned != i64::from(token.id) {
            return Err(StoreError::Integrity(format!(
                "engine assigned id {assigned}, expected {}",
                token.id
            )));
        }

        if token.config.is_initialized {
            let seal = token.seal.as_ref().ok_or_else(|| {
                StoreError::Integrity("initialized token has no seal object".into())
            })?;

            tx.execute(
                "INSERT INTO sealobjects
                    (tokid, userpub, userpriv, userauthsalt, sopub, sopriv, soauthsalt)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    token.id,
                    seal.userpub,
                    seal.userpriv,
                    seal.userauthsalt,
                    seal.sopub,
                    seal.sopriv,
                    seal.soauthsalt,
                ],
            )?;
        }

        tx.commit()?;

        tracing::info!(tokid = token.id, label, "token stored");
        Ok(())
    }

    /// Delete a token. The engine cascades to its token objects and seal
    /// object; primary objects are never cascade-deleted.
    pub fn delete(&self, id: u32) -> Result<(), StoreError> {
        let tx = self.db.transaction()?;
        tx.execute("DELETE FROM tokens WHERE id=?1", params![id])?;
        tx.commit()?;

        tracing::info!(tokid = id, "token deleted");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonAttributeCodec;
    use crate::error::ErrorKind;
    use crate::hsm::testing::FakeHsm;
    use crate::store::models::{Attribute, AttributeBag, SealObject, TokenObject};

    fn repo_parts() -> (Database, FakeHsm, JsonAttributeCodec) {
        (Database::open_in_memory().unwrap(), FakeHsm, JsonAttributeCodec)
    }

    fn seal_fixture() -> SealObject {
        SealObject {
            id: 0,
            userpub: None,
            userpriv: None,
            userauthsalt: None,
            sopub: vec![0x33],
            sopriv: vec![0x44],
            soauthsalt: "sosalt".to_string(),
        }
    }

    fn initialized_token(db: &Database, id: u32, label: &str) -> Token {
        let pid = PrimaryObjectRepository::new(db).add(&[0x42]).unwrap();
        Token {
            id,
            pid,
            label: label.to_string(),
            config: TokenConfig {
                is_initialized: true,
                ..TokenConfig::default()
            },
            primary: None,
            seal: Some(seal_fixture()),
            objects: Vec::new(),
        }
    }

    #[test]
    fn test_empty_store_yields_one_placeholder() {
        let (db, hsm, codec) = repo_parts();
        let repo = TokenRepository::new(&db, &hsm, &codec);

        let tokens = repo.load_all().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].id, 1);
        assert!(!tokens[0].config.is_initialized);
        assert!(tokens[0].primary.is_none());
    }

    #[test]
    fn test_add_then_load_round_trips() {
        let (db, hsm, codec) = repo_parts();
        let repo = TokenRepository::new(&db, &hsm, &codec);

        let token = initialized_token(&db, 1, "my token");
        repo.add(&token).unwrap();

        let tokens = repo.load_all().unwrap();
        // The initialized token plus the synthesized placeholder.
        assert_eq!(tokens.len(), 2);

        let loaded = &tokens[0];
        assert_eq!(loaded.id, 1);
        assert_eq!(loaded.label, "my token");
        assert!(loaded.config.is_initialized);
        assert_eq!(loaded.pid, token.pid);
        assert!(loaded.primary.is_some());
        let seal = loaded.seal.as_ref().unwrap();
        assert_eq!(seal.soauthsalt, "sosalt");

        assert_eq!(tokens[1].id, 2, "placeholder identity is count + 1");
        assert!(!tokens[1].config.is_initialized);
    }

    #[test]
    fn test_label_pad_spaces_are_trimmed() {
        let (db, hsm, codec) = repo_parts();
        let repo = TokenRepository::new(&db, &hsm, &codec);

        let token = initialized_token(&db, 1, "padded label                    ");
        repo.add(&token).unwrap();

        let stored: String = db
            .conn()
            .query_row("SELECT label FROM tokens WHERE id=1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, "padded label");
    }

    #[test]
    fn test_add_uninitialized_token_skips_seal_insert() {
        let (db, hsm, codec) = repo_parts();
        let repo = TokenRepository::new(&db, &hsm, &codec);

        let pid = PrimaryObjectRepository::new(&db).add(&[0x42]).unwrap();
        let mut token = Token::uninitialized(1);
        token.pid = pid;
        token.label = "fresh".to_string();
        repo.add(&token).unwrap();

        let seals: i64 = db
            .conn()
            .query_row("SELECT count(*) FROM sealobjects", [], |row| row.get(0))
            .unwrap();
        assert_eq!(seals, 0);
    }

    #[test]
    fn test_add_initialized_token_without_seal_is_integrity_error() {
        let (db, hsm, codec) = repo_parts();
        let repo = TokenRepository::new(&db, &hsm, &codec);

        let mut token = initialized_token(&db, 1, "broken");
        token.seal = None;

        let err = repo.add(&token).unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));

        // The transaction rolled back: no token row either.
        let count: i64 = db
            .conn()
            .query_row("SELECT count(*) FROM tokens", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_duplicate_identity_is_rejected() {
        let (db, hsm, codec) = repo_parts();
        let repo = TokenRepository::new(&db, &hsm, &codec);

        repo.add(&initialized_token(&db, 7, "first")).unwrap();
        let err = repo.add(&initialized_token(&db, 7, "second")).unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_token_limit_maps_to_resource_exhaustion() {
        let (db, hsm, codec) = repo_parts();
        let repo = TokenRepository::new(&db, &hsm, &codec);
        let pid = PrimaryObjectRepository::new(&db).add(&[0x42]).unwrap();

        for id in 1..=255u32 {
            let mut token = Token::uninitialized(id);
            token.pid = pid;
            token.label = format!("token-{id}");
            repo.add(&token).unwrap();
        }

        let mut token = Token::uninitialized(256);
        token.pid = pid;
        token.label = "one-too-many".to_string();
        let err = repo.add(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn test_initialized_token_loads_objects() {
        let (db, hsm, codec) = repo_parts();
        let repo = TokenRepository::new(&db, &hsm, &codec);

        repo.add(&initialized_token(&db, 1, "with objects")).unwrap();

        let objects = TokenObjectRepository::new(&db, &codec);
        let mut bag = AttributeBag::new();
        bag.put(Attribute::new(0x1, b"CKO_DATA".to_vec())).unwrap();
        let mut object = TokenObject::new(bag);
        objects.add(1, &mut object).unwrap();

        let tokens = repo.load_all().unwrap();
        assert_eq!(tokens[0].objects.len(), 1);
        assert_eq!(tokens[0].objects[0].id, object.id);
    }

    #[test]
    fn test_initialized_token_missing_seal_row_fails_load() {
        let (db, hsm, codec) = repo_parts();
        let repo = TokenRepository::new(&db, &hsm, &codec);

        let pid = PrimaryObjectRepository::new(&db).add(&[0x42]).unwrap();
        db.conn()
            .execute(
                "INSERT INTO tokens (id, pid, label, config)
                 VALUES (1, ?1, 'broken', '{\"is_initialized\":true}')",
                params![pid],
            )
            .unwrap();

        let err = repo.load_all().unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_token_with_missing_primary_fails_load() {
        let (db, hsm, codec) = repo_parts();
        let repo = TokenRepository::new(&db, &hsm, &codec);

        // Write an orphan row directly, with referential checks off.
        db.conn()
            .pragma_update(None, "foreign_keys", "OFF")
            .unwrap();
        db.conn()
            .execute(
                "INSERT INTO tokens (id, pid, label, config) VALUES (1, 99, 'orphan', '{}')",
                [],
            )
            .unwrap();

        let err = repo.load_all().unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_delete_cascades_to_owned_records() {
        let (db, hsm, codec) = repo_parts();
        let repo = TokenRepository::new(&db, &hsm, &codec);

        repo.add(&initialized_token(&db, 1, "doomed")).unwrap();
        let objects = TokenObjectRepository::new(&db, &codec);
        let mut bag = AttributeBag::new();
        bag.put(Attribute::new(0x1, vec![0x01])).unwrap();
        let mut object = TokenObject::new(bag);
        objects.add(1, &mut object).unwrap();

        repo.delete(1).unwrap();

        for table in ["tokens", "sealobjects", "tobjects"] {
            let count: i64 = db
                .conn()
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert_eq!(count, 0, "{table} must be empty after cascade");
        }

        // The primary object survives.
        let count: i64 = db
            .conn()
            .query_row("SELECT count(*) FROM pobjects", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_persisted_uninitialized_token_suppresses_placeholder() {
        let (db, hsm, codec) = repo_parts();
        let repo = TokenRepository::new(&db, &hsm, &codec);

        let pid = PrimaryObjectRepository::new(&db).add(&[0x42]).unwrap();
        let mut token = Token::uninitialized(1);
        token.pid = pid;
        token.label = "pending".to_string();
        repo.add(&token).unwrap();

        let tokens = repo.load_all().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].id, 1);
        assert!(!tokens[0].config.is_initialized);
        // Persisted, so its primary was loaded.
        assert!(tokens[0].primary.is_some());
    }
}
