// Sealstore — Store Module
//
// The transactional token/object repository. Discovery finds the one store
// file, an advisory lock guards creation and migration, the schema manager
// brings the file to the current version behind a backup, and four
// repositories provide CRUD and pin rotation over the live handle.

mod db;
mod error;
mod lock;
pub mod models;
mod paths;
mod pobjects;
mod schema;
mod sealobjects;
mod tobjects;
mod tokens;

pub use db::Database;
pub use error::StoreError;
pub use lock::{StoreLock, LOCK_SUFFIX};
pub use models::{
    Attribute, AttributeBag, IdentitySource, PrimaryObject, Role, SealObject, Token, TokenConfig,
    TokenObject, LABEL_LEN, MAX_OBJECT_COUNT, MAX_TOKEN_COUNT,
};
pub use paths::{Purpose, StorePaths, STORE_ENV_VAR, STORE_FILE_NAME, SYSTEM_STORE_DIR};
pub use pobjects::PrimaryObjectRepository;
pub use schema::{BACKUP_SUFFIX, DB_VERSION};
pub use sealobjects::SealObjectRepository;
pub use tobjects::TokenObjectRepository;
pub use tokens::TokenRepository;
