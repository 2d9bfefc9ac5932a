//! # ScreenBlock Core
//!
//! Credential foundation for ScreenBlock: the grid pattern a user draws to
//! lift the screen curtain, and the salted verifier that stands in for it on
//! disk.
//!
//! ```text
//! Pattern [0,1,2]  ──►  "0,1,2"  ──►  PBKDF2-HMAC-SHA256(salt, 150k)  ──►  hash
//!      │                                      │                             │
//!      │                                      │                             └── stored
//!      │                                      └── 16 fresh random bytes ────── stored
//!      └── NEVER stored
//! ```
//!
//! The pattern itself is never persisted. Only `{salt, hash, iterations}`
//! leave memory, always as one unit.

pub mod credential;
pub mod crypto;
pub mod geometry;
pub mod pattern;

pub use credential::{Credential, Salt, Verifier, DEFAULT_ITERATIONS, HASH_LEN, SALT_LEN};
pub use crypto::{create_credential, derive_verifier, generate_salt, verifiers_match};
pub use geometry::BubblePosition;
pub use pattern::{Grid, NodeId, Pattern, PatternError, PatternPolicy, PASSWORD_DELIMITER};

/// Result type for screenblock-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in screenblock-core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("OS entropy source failed: {0}")]
    Entropy(String),

    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
}
