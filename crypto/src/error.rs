#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Authentication tag verification failed. Deliberately carries no
    /// detail: a wrong secret and tampered ciphertext must be
    /// indistinguishable to the caller.
    #[error("authentication failed")]
    Authentication,
    /// Stored blob cannot even contain a nonce and tag. Surfaced to external
    /// observers the same way as [`CryptoError::Authentication`]; the message
    /// exists for operator diagnosis only.
    #[error("malformed encrypted blob: {0}")]
    Malformed(String),
    #[error("encryption error: {0}")]
    Encryption(String),
    #[error("key derivation error: {0}")]
    KeyDerivation(String),
    #[error("secret hashing error: {0}")]
    Hash(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
