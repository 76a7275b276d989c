// Sealstore — Hardware Abstraction Interface
//
// The store never performs cryptographic operations itself. The one thing it
// needs from the hardware layer is turning a persisted primary-object handle
// blob back into a live handle.

mod error;

pub use error::HsmError;

/// A live, hardware-context-specific object handle.
///
/// The numeric value is only meaningful to the hardware abstraction that
/// produced it; the store treats it as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsmHandle(pub u64);

/// The narrow interface the store consumes from the hardware abstraction.
pub trait Hsm {
    /// Deserialize a persisted handle blob into a live handle.
    ///
    /// The blob comes straight from the `pobjects.handle` column; the store
    /// never interprets its bytes.
    fn deserialize_handle(&self, blob: &[u8]) -> Result<HsmHandle, HsmError>;
}
