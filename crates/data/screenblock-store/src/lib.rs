//! ScreenBlock data layer
//!
//! Two durable regions, both replaced atomically (temp file + rename):
//!
//! - **Credential store**: the `{salt, hash}` pair, observable by any number
//!   of readers. Writers commit to disk before readers hear about it.
//! - **Session snapshot**: bubble position + whether the curtain was up,
//!   so a killed session can come back looking the same.

pub mod credential_store;
mod fsutil;
pub mod session_store;

pub use credential_store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use session_store::{
    FileSessionStore, MemorySessionStore, PersistedSession, SessionStatePersistence,
    SNAPSHOT_VERSION,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
