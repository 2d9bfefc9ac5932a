//! # ScreenBlock Keys
//!
//! Creates and checks the pattern credential.
//!
//! PBKDF2 at 150k rounds is far too slow for an async task, so every
//! derivation is handed to a single background thread ([`DerivationWorker`])
//! and awaited through a oneshot reply. [`KeyManager`] sits on top: it
//! validates patterns, writes new credentials through a
//! [`CredentialStore`](screenblock_store::CredentialStore) and answers
//! "does this pattern match?" for the overlay session.

mod error;
pub mod manager;
pub mod worker;

pub use error::{KeyError, Result};
pub use manager::{KeyManager, PatternVerifier};
pub use worker::DerivationWorker;
