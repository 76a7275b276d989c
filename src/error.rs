// Sealstore — Top-level error types
//
// Aggregates errors from the hsm and store modules into a single error enum
// for the application boundary, and classifies every failure into the small
// closed set of outcome kinds the PKCS#11-style dispatch layer maps onto its
// own status codes.

use thiserror::Error;

/// Top-level error type for all sealstore operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("HSM error: {0}")]
    Hsm(#[from] crate::hsm::HsmError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The closed set of outcome classes surfaced to the dispatch layer.
///
/// Callers never see engine-specific codes; everything collapses into one of
/// these so status mapping stays uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The store, or a record that must exist, is absent.
    NotFound,
    /// A declarative row-count guard fired or an allocation limit was hit.
    ResourceExhausted,
    /// Everything else: malformed data, integrity violations, engine or
    /// environment failures.
    GeneralFailure,
}

impl Error {
    /// Classify this error for the dispatch layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Store(e) => e.kind(),
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::GeneralFailure,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
