// Sealstore — Library root
//
// Persistent object store for an HSM-backed PKCS#11 credential provider.
// Re-exports the store, the hardware-abstraction interface, and the
// attribute codec interface.

pub mod codec;
pub mod error;
pub mod hsm;
pub mod store;

pub use error::{Error, ErrorKind, Result};
