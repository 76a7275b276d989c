// Sealstore — Store error types

use std::path::PathBuf;

use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Attribute codec error: {0}")]
    Codec(#[from] crate::codec::CodecError),

    #[error("HSM error: {0}")]
    Hsm(#[from] crate::hsm::HsmError),

    #[error("Malformed data: {0}")]
    Malformed(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Resource limit reached: {0}")]
    LimitReached(String),

    #[error(
        "Backup already exists at \"{0}\" — refusing to overwrite. \
         It may be the only safety net from an earlier failed migration; \
         see docs/STORE_RECOVERY.md"
    )]
    BackupExists(PathBuf),

    #[error("Unsupported schema version {found} (current is {current})")]
    UnsupportedVersion { found: u32, current: u32 },

    #[error("Environment error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Collapse into the closed outcome set the dispatch layer consumes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::StoreNotFound(_) | StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::LimitReached(_) => ErrorKind::ResourceExhausted,
            // The declarative row-count guards fire as trigger-raised
            // constraint failures inside the engine.
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_TRIGGER =>
            {
                ErrorKind::ResourceExhausted
            }
            StoreError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::GeneralFailure,
        }
    }
}
