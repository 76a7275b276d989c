// Sealstore — Schema and migration management
//
// Owns the versioned table definitions, detects the persisted schema
// version, and runs the ordered upgrader chain. Destructive work happens
// under the advisory lock and behind a full online backup of the store;
// a failed run leaves the backup in place for manual recovery.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{backup::Backup, params, Connection};

use super::lock::StoreLock;
use super::paths::path_with_suffix;
use super::StoreError;

/// Current schema version. Version 0 was never valid.
pub const DB_VERSION: u32 = 2;

/// Suffix appended to the store path to form the backup file path.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Table creation statements for the current version. All idempotent, so an
/// existing store passes through untouched.
const CREATE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS tokens(
        id INTEGER PRIMARY KEY,
        pid INTEGER NOT NULL,
        label TEXT UNIQUE,
        config TEXT NOT NULL,
        FOREIGN KEY (pid) REFERENCES pobjects(id) ON DELETE CASCADE
    );
    CREATE TABLE IF NOT EXISTS sealobjects(
        id INTEGER PRIMARY KEY,
        tokid INTEGER NOT NULL,
        userpub BLOB,
        userpriv BLOB,
        userauthsalt TEXT,
        sopub BLOB NOT NULL,
        sopriv BLOB NOT NULL,
        soauthsalt TEXT NOT NULL,
        FOREIGN KEY (tokid) REFERENCES tokens(id) ON DELETE CASCADE
    );
    CREATE TABLE IF NOT EXISTS pobjects(
        id INTEGER PRIMARY KEY,
        hierarchy TEXT NOT NULL,
        handle BLOB NOT NULL,
        objauth TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS tobjects(
        id INTEGER PRIMARY KEY,
        tokid INTEGER NOT NULL,
        attrs TEXT NOT NULL,
        FOREIGN KEY (tokid) REFERENCES tokens(id) ON DELETE CASCADE
    );
    CREATE TABLE IF NOT EXISTS schema(
        id INTEGER PRIMARY KEY,
        schema_version INTEGER NOT NULL
    );
    CREATE TRIGGER IF NOT EXISTS limit_tokens
    BEFORE INSERT ON tokens
    BEGIN
        SELECT CASE WHEN
            (SELECT COUNT (*) FROM tokens) >= 255
        THEN
            RAISE(FAIL, 'Maximum token count of 255 reached.')
        END;
    END;
    CREATE TRIGGER IF NOT EXISTS limit_tobjects
    BEFORE INSERT ON tobjects
    BEGIN
        SELECT CASE WHEN
            (SELECT COUNT (*) FROM tobjects) >= 16777215
        THEN
            RAISE(FAIL, 'Maximum object count of 16777215 reached.')
        END;
    END;
";

/// Bring the store at `path` to the current version.
///
/// Sequence: advisory lock → full backup → upgrade chain → idempotent table
/// creation and version record. On success the backup is deleted; on any
/// failure it stays put and the error points the operator at manual
/// recovery.
pub fn setup(conn: &Connection, path: &Path) -> Result<(), StoreError> {
    let _lock = StoreLock::acquire(path)?;

    let backup_path = backup(conn, path)?;

    let result = upgrade_if_needed(conn).and_then(|()| create_current(conn));

    match result {
        Ok(()) => {
            tracing::debug!(path = %backup_path.display(), "removing store backup");
            if let Err(e) = std::fs::remove_file(&backup_path) {
                tracing::warn!(
                    path = %backup_path.display(), error = %e,
                    "could not remove store backup"
                );
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                backup = %backup_path.display(),
                "store setup failed, leaving backup in place; see docs/STORE_RECOVERY.md"
            );
            Err(e)
        }
    }
}

/// Create (if absent) the current tables, guard triggers, and version
/// record. Safe to run on a store of any supported vintage.
pub fn create_current(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(CREATE_SQL)?;

    // REPLACE updates the record if it exists, inserts it if it doesn't.
    conn.execute(
        "REPLACE INTO schema (id, schema_version) VALUES (1, ?1)",
        params![DB_VERSION],
    )?;

    Ok(())
}

/// Read the persisted schema version.
///
/// A store with no version record at all (no `schema` table, or an empty
/// one) predates versioning and is treated as already current — a
/// compatibility shim, deliberately narrow.
pub fn version(conn: &Connection) -> Result<u32, StoreError> {
    let mut stmt = match conn.prepare("SELECT schema_version FROM schema") {
        Ok(stmt) => stmt,
        Err(e) => {
            tracing::warn!(error = %e, "no schema version record, assuming current");
            return Ok(DB_VERSION);
        }
    };

    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(DB_VERSION),
    }
}

fn upgrade_if_needed(conn: &Connection) -> Result<(), StoreError> {
    let old = version(conn)?;

    if old == 0 {
        return Err(StoreError::Integrity(
            "schema version 0 was never a valid store version".into(),
        ));
    }

    if old == DB_VERSION {
        tracing::debug!("no store upgrade needed");
        return Ok(());
    }

    if old > DB_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: old,
            current: DB_VERSION,
        });
    }

    for from in old..DB_VERSION {
        let upgrader = upgrader_for(from).ok_or_else(|| {
            StoreError::Integrity(format!("no upgrader from schema version {from}"))
        })?;

        tracing::info!(from, to = from + 1, "upgrading store schema");

        // Each upgrader is all-or-nothing.
        let tx = conn.unchecked_transaction()?;
        upgrader(&tx)?;
        tx.commit()?;
    }

    Ok(())
}

type Upgrader = fn(&Connection) -> Result<(), StoreError>;

fn upgrader_for(from: u32) -> Option<Upgrader> {
    match from {
        1 => Some(upgrade_1_to_2),
        _ => None,
    }
}

/// Version 1 required every user credential column in `sealobjects` to be
/// present; version 2 lets a token be initialized before a user PIN exists.
/// SQLite cannot drop a NOT NULL constraint in place, so: create a relaxed
/// copy, move the rows, drop the original, rename.
fn upgrade_1_to_2(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE sealobjects_new2(
            id INTEGER PRIMARY KEY,
            tokid INTEGER NOT NULL,
            userpub BLOB,
            userpriv BLOB,
            userauthsalt TEXT,
            sopub BLOB NOT NULL,
            sopriv BLOB NOT NULL,
            soauthsalt TEXT NOT NULL,
            FOREIGN KEY (tokid) REFERENCES tokens(id) ON DELETE CASCADE
        );
        INSERT INTO sealobjects_new2 SELECT * FROM sealobjects;
        DROP TABLE sealobjects;
        ALTER TABLE sealobjects_new2 RENAME TO sealobjects;
        ",
    )?;
    Ok(())
}

/// Online backup of the live store into `<path>.bak`.
///
/// A backup already sitting there is an error: it may be the only safety net
/// from an earlier failed run, so it is never overwritten.
fn backup(conn: &Connection, path: &Path) -> Result<PathBuf, StoreError> {
    let backup_path = path_with_suffix(path, BACKUP_SUFFIX);

    match std::fs::metadata(&backup_path) {
        Ok(_) => return Err(StoreError::BackupExists(backup_path)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(StoreError::Io(e)),
    }

    tracing::debug!(path = %backup_path.display(), "backing up store");

    let mut dst = Connection::open(&backup_path)?;
    {
        let op = Backup::new(conn, &mut dst)?;
        op.run_to_completion(100, Duration::from_millis(0), None)?;
    }
    dst.close().map_err(|(_, e)| StoreError::Database(e))?;

    Ok(backup_path)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
