//! Timing-safe verifier comparison

use subtle::ConstantTimeEq;

/// Compare two verifiers without an early exit on the first differing byte
///
/// Mismatched lengths compare unequal. Verifier length is public, so only
/// the content comparison needs to be constant-time.
pub fn verifiers_match(expected: &[u8], candidate: &[u8]) -> bool {
    expected.ct_eq(candidate).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal() {
        assert!(verifiers_match(&[1, 2, 3, 4], &[1, 2, 3, 4]));
    }

    #[test]
    fn test_differs_anywhere() {
        assert!(!verifiers_match(&[1, 2, 3, 4], &[0, 2, 3, 4]));
        assert!(!verifiers_match(&[1, 2, 3, 4], &[1, 2, 3, 5]));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(!verifiers_match(&[1, 2, 3], &[1, 2, 3, 4]));
        assert!(!verifiers_match(&[], &[1]));
    }
}
