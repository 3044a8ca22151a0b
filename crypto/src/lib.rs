//! Cryptographic primitives for the keyshelter backup engine.
//!
//! Everything here is stateless and synchronous: the caller decides how to
//! schedule the CPU-expensive operations (PBKDF2, Argon2). Two independent
//! derivations are made from the same user secret and must stay independent:
//! the PBKDF2 key that feeds the AEAD ([`kdf`]/[`aead`]) and the Argon2 hash
//! used for audit gating ([`hash`]). Compromising one must not help forge
//! the other.

pub mod aead;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod validate;

pub use error::{CryptoError, CryptoResult};
pub use hash::SecretHasher;
pub use validate::{SecretFormatError, SecretKind};

pub use secrecy::ExposeSecret;

/// User secret (PIN or passphrase). Kept out of `Debug` output and zeroized
/// on drop.
pub type Secret = secrecy::SecretString;
