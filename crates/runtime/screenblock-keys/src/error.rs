use screenblock_core::PatternError;
use screenblock_store::StoreError;
use thiserror::Error;

/// Why a credential could not be created
///
/// Every variant is recoverable: nothing was written, so the caller may retry.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Pattern rejected: {0}")]
    InvalidPattern(#[from] PatternError),

    #[error("Could not gather randomness for a new salt: {0}")]
    Entropy(String),

    #[error("Could not derive the pattern hash: {0}")]
    Derivation(String),

    #[error("Could not save the new pattern: {0}")]
    Storage(#[from] StoreError),

    #[error("The new pattern was written but could not be read back")]
    WriteNotVerified,

    #[error("Key derivation worker unavailable: {0}")]
    Worker(String),
}

impl From<screenblock_core::Error> for KeyError {
    fn from(err: screenblock_core::Error) -> Self {
        match err {
            screenblock_core::Error::Pattern(e) => KeyError::InvalidPattern(e),
            screenblock_core::Error::Entropy(msg) => KeyError::Entropy(msg),
            other => KeyError::Derivation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, KeyError>;
