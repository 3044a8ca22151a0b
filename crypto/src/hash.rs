//! Secret hashing for audit gating, and content fingerprinting.
//!
//! The Argon2id hash stored as `pin_hash` exists to feed the audit trail and
//! external rate limiting. It is generated with its own random salt and is
//! deliberately not interchangeable with the PBKDF2 derivation that feeds
//! the AEAD: neither output helps forge the other.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};

use crate::{CryptoError, CryptoResult, Secret};

/// Argon2id hasher for user secrets.
#[derive(Clone)]
pub struct SecretHasher {
    argon2: Argon2<'static>,
}

impl SecretHasher {
    /// Build a hasher with explicit Argon2 cost parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter combination is rejected by Argon2.
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> CryptoResult<Self> {
        let params = Params::new(memory_cost, time_cost, parallelism, None)
            .map_err(|e| CryptoError::Hash(format!("invalid Argon2 params: {e}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a user secret into a PHC string with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns an error if Argon2 fails to produce a hash.
    pub fn hash_secret(&self, secret: &Secret) -> CryptoResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.expose_secret().as_bytes(), &salt)
            .map_err(|e| CryptoError::Hash(format!("failed to hash secret: {e}")))?;
        Ok(hash.to_string())
    }

    /// Verify a secret against a stored PHC string.
    ///
    /// Comparison is constant-time inside the Argon2 verifier. An unparsable
    /// stored hash verifies as `false` rather than erroring: callers treat
    /// the hash as advisory.
    #[must_use]
    pub fn verify_secret(&self, secret: &Secret, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        self.argon2
            .verify_password(secret.expose_secret().as_bytes(), &parsed)
            .is_ok()
    }
}

impl Default for SecretHasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

/// Non-secret SHA-256 fingerprint of a blob, hex encoded.
///
/// Display/debug/consistency checks only; never sufficient to authenticate
/// a restore.
#[must_use]
pub fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn secret(s: &str) -> Secret {
        Secret::from(s.to_string())
    }

    // Low-cost parameters so the test suite stays fast.
    fn test_hasher() -> SecretHasher {
        SecretHasher::new(8, 1, 1).unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let hasher = test_hasher();
        let hash = hasher.hash_secret(&secret("123456")).unwrap();

        assert!(hasher.verify_secret(&secret("123456"), &hash));
        assert!(!hasher.verify_secret(&secret("654321"), &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let hasher = test_hasher();
        let a = hasher.hash_secret(&secret("123456")).unwrap();
        let b = hasher.hash_secret(&secret("123456")).unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify_secret(&secret("123456"), &a));
        assert!(hasher.verify_secret(&secret("123456"), &b));
    }

    #[test]
    fn garbage_stored_hash_verifies_false() {
        let hasher = test_hasher();
        assert!(!hasher.verify_secret(&secret("123456"), "not a phc string"));
        assert!(!hasher.verify_secret(&secret("123456"), ""));
    }

    #[test]
    fn fingerprint_is_stable_sha256() {
        assert_eq!(
            fingerprint(b"abc"),
            hex::encode(hex!(
                "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
            ))
        );
        assert_eq!(fingerprint(b"abc").len(), 64);
    }
}
