//! Stored credential - the salt/verifier pair that replaces the pattern
//!
//! A credential is always created, stored and replaced as one unit. There is
//! no way to swap the salt or the hash on their own.

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::{Error, Result};

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Verifier length in bytes (256-bit PBKDF2 output)
pub const HASH_LEN: usize = 32;

/// PBKDF2 rounds used for new credentials
pub const DEFAULT_ITERATIONS: u32 = 150_000;

pub type Salt = [u8; SALT_LEN];
pub type Verifier = [u8; HASH_LEN];

/// Salted PBKDF2 verifier of a pattern
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    salt: Salt,
    hash: Verifier,
    iterations: u32,
}

impl Zeroize for Credential {
    fn zeroize(&mut self) {
        self.salt.zeroize();
        self.hash.zeroize();
        self.iterations.zeroize();
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl Credential {
    pub fn new(salt: Salt, hash: Verifier, iterations: u32) -> Self {
        Self { salt, hash, iterations }
    }

    /// Rebuild from raw stored bytes, checking lengths
    pub fn from_slices(salt: &[u8], hash: &[u8], iterations: u32) -> Result<Self> {
        let salt: Salt = salt.try_into().map_err(|_| Error::InvalidKeyLength {
            expected: SALT_LEN,
            got: salt.len(),
        })?;
        let hash: Verifier = hash.try_into().map_err(|_| Error::InvalidKeyLength {
            expected: HASH_LEN,
            got: hash.len(),
        })?;
        Ok(Self::new(salt, hash, iterations))
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    pub fn hash(&self) -> &Verifier {
        &self.hash
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Short public identifier, safe to log
    pub fn fingerprint(&self) -> [u8; 4] {
        let digest = Sha256::digest(self.hash);
        let mut fp = [0u8; 4];
        fp.copy_from_slice(&digest[..4]);
        fp
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Credential(fingerprint: {}, iterations: {})",
            hex::encode(self.fingerprint()),
            self.iterations
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slices() {
        let cred = Credential::from_slices(&[1u8; 16], &[2u8; 32], 10).unwrap();
        assert_eq!(cred.salt(), &[1u8; 16]);
        assert_eq!(cred.hash(), &[2u8; 32]);
        assert_eq!(cred.iterations(), 10);
    }

    #[test]
    fn test_from_slices_wrong_lengths() {
        let err = Credential::from_slices(&[1u8; 15], &[2u8; 32], 10).unwrap_err();
        assert!(matches!(err, Error::InvalidKeyLength { expected: 16, got: 15 }));

        let err = Credential::from_slices(&[1u8; 16], &[2u8; 31], 10).unwrap_err();
        assert!(matches!(err, Error::InvalidKeyLength { expected: 32, got: 31 }));
    }

    #[test]
    fn test_debug_redacts_bytes() {
        let cred = Credential::new([0xAA; 16], [0xBB; 32], DEFAULT_ITERATIONS);
        let text = format!("{:?}", cred);
        assert!(text.starts_with("Credential(fingerprint: "));
        assert!(text.contains("iterations: 150000"));
        assert!(!text.contains(&hex::encode([0xBB; 32])));
        assert!(!text.contains(&hex::encode([0xAA; 16])));
    }

    #[test]
    fn test_fingerprint_stable() {
        let cred = Credential::new([3; 16], [4; 32], 1);
        assert_eq!(cred.fingerprint(), cred.clone().fingerprint());
    }
}
