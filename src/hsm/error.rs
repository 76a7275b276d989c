// Sealstore — HSM interface error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HsmError {
    #[error("Handle deserialization failed: {0}")]
    Deserialize(String),

    #[error("Hardware context unavailable: {0}")]
    Unavailable(String),
}
