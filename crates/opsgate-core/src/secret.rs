//! Secret generation and hashing for the step-up credential.
//!
//! The secret is a short fixed-length numeric code. Generation uses the OS
//! CSPRNG; comparisons always go through the SHA-256 hash so lookups never
//! need the plaintext.

use std::fmt;

use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default secret length in digits.
///
/// Generation and validation share this single constant: a generated code is
/// always exactly as long as validation expects.
pub const SECRET_LEN: usize = 6;

/// Generate a fresh numeric secret of `len` digits.
///
/// Each digit is drawn uniformly from the OS random source, so leading
/// zeros are as likely as any other digit and the output is always exactly
/// `len` characters.
pub fn generate_secret(len: usize) -> String {
    let mut rng = OsRng;
    (0..len)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Fast-path lexical check: exactly `len` ASCII digits.
///
/// A malformed input is a validation error, distinct from a well-formed but
/// wrong secret (which is an authorization failure).
pub fn is_well_formed(secret: &str, len: usize) -> bool {
    secret.len() == len && secret.bytes().all(|b| b.is_ascii_digit())
}

/// SHA-256 hash of a secret, hex-encoded.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretHash(String);

impl SecretHash {
    /// Hash a plaintext secret.
    pub fn of(secret: &str) -> Self {
        Self(hex::encode(Sha256::digest(secret.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretHash({}…)", &self.0[..8.min(self.0.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_generated_secret_shape() {
        for _ in 0..50 {
            let secret = generate_secret(SECRET_LEN);
            assert!(is_well_formed(&secret, SECRET_LEN), "bad secret: {secret}");
        }
    }

    #[test]
    fn test_well_formed_rejects_wrong_shapes() {
        assert!(is_well_formed("012345", 6));
        assert!(!is_well_formed("12345", 6));
        assert!(!is_well_formed("1234567", 6));
        assert!(!is_well_formed("12345a", 6));
        assert!(!is_well_formed("12 456", 6));
        assert!(!is_well_formed("", 6));
    }

    #[test]
    fn test_hash_is_deterministic_and_hex() {
        let a = SecretHash::of("482913");
        let b = SecretHash::of("482913");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().bytes().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_distinguishes_secrets() {
        assert_ne!(SecretHash::of("000000"), SecretHash::of("000001"));
    }

    proptest! {
        #[test]
        fn prop_generated_length_matches_request(len in 1usize..16) {
            let secret = generate_secret(len);
            prop_assert!(is_well_formed(&secret, len));
        }
    }
}
