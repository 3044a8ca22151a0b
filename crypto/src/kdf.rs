//! Password-based key derivation.
//!
//! PBKDF2-HMAC-SHA-256 turns a user secret plus a per-backup salt into the
//! AES-256 key that wraps the backed-up key material. Derivation is
//! deterministic for a given `(secret, salt, iterations)` triple; restore
//! depends on that.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use secrecy::ExposeSecret;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{CryptoError, CryptoResult, Secret};

/// Salt length in bytes for new backups.
pub const SALT_SIZE: usize = 32;

/// Derived key length: 256 bits for AES-256-GCM.
pub const KEY_SIZE: usize = 32;

/// Baseline PBKDF2 work factor. Configurable upward only; stored per backup
/// record so it can be raised later without invalidating old backups.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Generate a fresh random salt from the OS CSPRNG.
///
/// Never derived from user input; never reused across users or rotations.
#[must_use]
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::rng().fill_bytes(&mut salt);
    salt
}

/// Derive a symmetric key from the user secret and salt.
///
/// Output is zeroized automatically when dropped.
///
/// # Errors
///
/// Returns an error if `iterations` is zero or `salt` is empty.
pub fn derive_key(
    secret: &Secret,
    salt: &[u8],
    iterations: u32,
) -> CryptoResult<Zeroizing<[u8; KEY_SIZE]>> {
    if iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "PBKDF2 iterations must be non-zero".to_string(),
        ));
    }
    if salt.is_empty() {
        return Err(CryptoError::KeyDerivation(
            "salt must not be empty".to_string(),
        ));
    }

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2_hmac::<Sha256>(
        secret.expose_secret().as_bytes(),
        salt,
        iterations,
        key.as_mut_slice(),
    );

    Ok(key)
}
