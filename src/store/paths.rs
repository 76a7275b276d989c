// Sealstore — Store discovery
//
// Determines the one on-disk location the store lives at. Candidates are
// tried in a fixed priority order; the first usable one wins. "Does not
// exist" keeps the search going, any other filesystem error aborts it.

use std::io;
use std::path::{Path, PathBuf};

use super::StoreError;

/// Fixed, product-specific store file name.
pub const STORE_FILE_NAME: &str = "sealstore.sqlite3";

/// Environment variable naming a directory that holds (or will hold) the
/// store. Highest-priority candidate.
pub const STORE_ENV_VAR: &str = "SEALSTORE_DIR";

/// Compiled-in system fallback directory. Lowest-priority candidate.
pub const SYSTEM_STORE_DIR: &str = "/etc/sealstore";

/// What the caller needs the resolved path for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// A store file must already be present at the candidate.
    FindExisting,
    /// The candidate's parent directory must exist; the store file itself
    /// need not (a stat-not-open check).
    CreateNew,
}

/// Candidate provider for store discovery.
///
/// Constructed from the process environment for production use, or directly
/// from parts so tests can resolve against temp directories without touching
/// global state.
#[derive(Debug, Clone)]
pub struct StorePaths {
    env_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    cwd: Option<PathBuf>,
    system_dir: PathBuf,
}

impl StorePaths {
    /// Candidates from the live environment: `SEALSTORE_DIR`, the user home,
    /// the working directory, then the compiled-in system directory.
    pub fn from_env() -> Self {
        Self {
            env_dir: std::env::var_os(STORE_ENV_VAR).map(PathBuf::from),
            home_dir: dirs::home_dir(),
            cwd: std::env::current_dir().ok(),
            system_dir: PathBuf::from(SYSTEM_STORE_DIR),
        }
    }

    /// Explicit candidates, for callers (and tests) that control discovery.
    pub fn new(
        env_dir: Option<PathBuf>,
        home_dir: Option<PathBuf>,
        cwd: Option<PathBuf>,
        system_dir: PathBuf,
    ) -> Self {
        Self {
            env_dir,
            home_dir,
            cwd,
            system_dir,
        }
    }

    /// Candidate store-file paths in search order. Candidates whose inputs
    /// are unavailable (unset env var, no resolvable home) are skipped.
    fn candidates(&self) -> Vec<PathBuf> {
        let mut out = Vec::with_capacity(4);
        if let Some(dir) = &self.env_dir {
            out.push(dir.join(STORE_FILE_NAME));
        }
        if let Some(home) = &self.home_dir {
            out.push(home.join(".sealstore").join(STORE_FILE_NAME));
        }
        if let Some(cwd) = &self.cwd {
            out.push(cwd.join(STORE_FILE_NAME));
        }
        out.push(self.system_dir.join(STORE_FILE_NAME));
        out
    }

    /// Walk the candidates and return the first usable store path.
    ///
    /// Exhausting every candidate is a [`StoreError::StoreNotFound`];
    /// any stat failure other than "does not exist" aborts immediately.
    pub fn resolve(&self, purpose: Purpose) -> Result<PathBuf, StoreError> {
        for candidate in self.candidates() {
            let usable = match purpose {
                Purpose::FindExisting => exists(&candidate)?,
                Purpose::CreateNew => match candidate.parent() {
                    Some(parent) => exists(parent)?,
                    // Relative single-component path: the working directory
                    // is always usable.
                    None => true,
                },
            };
            if usable {
                tracing::debug!(path = %candidate.display(), ?purpose, "resolved store path");
                return Ok(candidate);
            }
            tracing::debug!(path = %candidate.display(), "candidate not usable, continuing");
        }

        Err(StoreError::StoreNotFound(format!(
            "no usable store location; consider exporting {STORE_ENV_VAR} \
             to point at a valid store directory"
        )))
    }
}

/// Sibling path formed by appending `suffix` to the full file name, the
/// convention used for both the lock file and the migration backup.
pub(crate) fn path_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// stat() that treats only "does not exist" as a soft miss.
fn exists(path: &Path) -> Result<bool, StoreError> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::Io(e)),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
