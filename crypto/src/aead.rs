//! AES-256-GCM wrapping of the opaque key blob.
//!
//! This is the second encryption layer: the plaintext passed in here is the
//! messaging layer's already-encrypted key material, treated as opaque bytes.
//! Blob layout is `nonce ‖ ciphertext ‖ tag` with a fresh random nonce per
//! call, so encrypting the same plaintext twice never yields the same blob.

use aes_gcm::{
    Aes256Gcm, KeyInit,
    aead::{Aead, generic_array::GenericArray},
};
use rand::RngCore;

use crate::kdf::derive_key;
use crate::{CryptoError, CryptoResult, Secret};

/// AES-GCM nonce length in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// Scheme identifier persisted with each backup (`encryption_method`).
/// Bump when the algorithm or KDF changes so old backups stay restorable.
pub const SCHEME_VERSION: &str = "aes256-gcm.pbkdf2-sha256.v1";

/// Encrypt the key blob under a key derived from the user secret.
///
/// # Errors
///
/// Returns an error if key derivation or the cipher itself fails.
pub fn encrypt_keys(
    plaintext: &[u8],
    secret: &Secret,
    salt: &[u8],
    iterations: u32,
) -> CryptoResult<Vec<u8>> {
    let key = derive_key(secret, salt, iterations)?;
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_slice()));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = GenericArray::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Re-derive the key and open the blob, verifying the tag before any
/// plaintext is released.
///
/// # Errors
///
/// [`CryptoError::Malformed`] if the blob cannot contain a nonce and tag,
/// [`CryptoError::Authentication`] on tag verification failure. The two must
/// be presented identically to external observers; only internal logs may
/// distinguish them.
pub fn decrypt_keys(
    blob: &[u8],
    secret: &Secret,
    salt: &[u8],
    iterations: u32,
) -> CryptoResult<Vec<u8>> {
    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Malformed(format!(
            "blob too short: {} bytes, minimum {}",
            blob.len(),
            NONCE_SIZE + TAG_SIZE
        )));
    }

    let key = derive_key(secret, salt, iterations)?;
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_slice()));

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
    cipher
        .decrypt(GenericArray::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::Authentication)
}
