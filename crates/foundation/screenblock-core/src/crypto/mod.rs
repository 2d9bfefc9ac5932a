//! Cryptographic primitives for pattern credentials
//!
//! - Salt comes straight from the OS entropy source
//! - Verifier = PBKDF2-HMAC-SHA256(pattern text, salt, iterations)
//! - Matching is constant-time over the whole verifier

mod compare;
mod derivation;

pub use compare::verifiers_match;
pub use derivation::{create_credential, derive_verifier, generate_salt};
