//! Verifier derivation
//!
//! PBKDF2 is deliberately slow. At the default 150k rounds a single
//! derivation costs tens of milliseconds in release builds, so callers
//! should keep it off any thread that drives windows.

use hmac::Hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::credential::{Credential, Salt, Verifier, HASH_LEN, SALT_LEN};
use crate::{Error, Pattern, Result};

/// Fresh random salt from the OS entropy source
pub fn generate_salt() -> Result<Salt> {
    let mut salt = [0u8; SALT_LEN];
    getrandom::getrandom(&mut salt).map_err(|e| Error::Entropy(e.to_string()))?;
    Ok(salt)
}

/// PBKDF2-HMAC-SHA256 of the pattern text with the given salt
pub fn derive_verifier(pattern: &Pattern, salt: &Salt, iterations: u32) -> Result<Zeroizing<Verifier>> {
    if iterations == 0 {
        return Err(Error::Derivation("iteration count must be non-zero".to_string()));
    }

    let password = pattern.password();
    let mut out = Zeroizing::new([0u8; HASH_LEN]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, iterations, &mut out[..])
        .map_err(|e| Error::Derivation(e.to_string()))?;

    Ok(out)
}

/// New credential for `pattern` with a never-before-used salt
pub fn create_credential(pattern: &Pattern, iterations: u32) -> Result<Credential> {
    let salt = generate_salt()?;
    let hash = derive_verifier(pattern, &salt, iterations)?;
    Ok(Credential::new(salt, *hash, iterations))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_ITERATIONS: u32 = 1_000;

    fn pattern(nodes: &[u8]) -> Pattern {
        Pattern::new(nodes.to_vec()).unwrap()
    }

    #[test]
    fn test_salt_generation() {
        let salt1 = generate_salt().unwrap();
        let salt2 = generate_salt().unwrap();

        // Two random salts should be different
        assert_ne!(salt1, salt2);
    }

    #[test]
    fn test_derivation_deterministic() {
        let salt = [7u8; SALT_LEN];
        let a = derive_verifier(&pattern(&[0, 1, 2]), &salt, TEST_ITERATIONS).unwrap();
        let b = derive_verifier(&pattern(&[0, 1, 2]), &salt, TEST_ITERATIONS).unwrap();

        // Same pattern + salt + rounds = same verifier
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_derivation_depends_on_inputs() {
        let salt = [7u8; SALT_LEN];
        let base = derive_verifier(&pattern(&[0, 1, 2]), &salt, TEST_ITERATIONS).unwrap();

        let reordered = derive_verifier(&pattern(&[2, 1, 0]), &salt, TEST_ITERATIONS).unwrap();
        let other_salt = derive_verifier(&pattern(&[0, 1, 2]), &[8u8; SALT_LEN], TEST_ITERATIONS).unwrap();
        let other_rounds = derive_verifier(&pattern(&[0, 1, 2]), &salt, TEST_ITERATIONS + 1).unwrap();

        assert_ne!(*base, *reordered);
        assert_ne!(*base, *other_salt);
        assert_ne!(*base, *other_rounds);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let err = derive_verifier(&pattern(&[0]), &[0u8; SALT_LEN], 0).unwrap_err();
        assert!(matches!(err, Error::Derivation(_)));
    }

    #[test]
    fn test_same_pattern_different_credentials() {
        let p = pattern(&[0, 1, 2]);
        let c1 = create_credential(&p, TEST_ITERATIONS).unwrap();
        let c2 = create_credential(&p, TEST_ITERATIONS).unwrap();

        assert_ne!(c1.salt(), c2.salt());
        assert_ne!(c1.hash(), c2.hash());
        assert_eq!(c1.iterations(), TEST_ITERATIONS);
    }

    #[test]
    fn test_credential_reproducible_from_salt() {
        let p = pattern(&[4, 0, 8]);
        let cred = create_credential(&p, TEST_ITERATIONS).unwrap();
        let again = derive_verifier(&p, cred.salt(), cred.iterations()).unwrap();
        assert_eq!(&*again, cred.hash());
    }
}
