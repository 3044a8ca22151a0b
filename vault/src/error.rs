use keyshelter_crypto::{CryptoError, SecretFormatError};

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Malformed PIN or weak passphrase. Recoverable by the caller with
    /// corrected input; never a security event.
    #[error("invalid secret: {0}")]
    Validation(#[from] SecretFormatError),
    #[error("no backup found")]
    NotFound,
    /// Wrong secret or corrupted ciphertext on restore. One message for
    /// every root cause so repeated probing gains no oracle.
    #[error("authentication failed")]
    Authentication,
    /// Storage unavailable or constraint violation. The detail stays out of
    /// the user-visible message; callers may retry.
    #[error("storage temporarily unavailable, try again")]
    Persistence(String),
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("internal crypto error: {0}")]
    Crypto(String),
}

pub type BackupResult<T> = Result<T, BackupError>;

impl From<CryptoError> for BackupError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Authentication => BackupError::Authentication,
            // A blob too short to hold nonce+tag is logged with its precise
            // cause for operators, then collapsed into the same generic
            // authentication failure the caller would see for a wrong secret.
            CryptoError::Malformed(msg) => {
                tracing::error!(cause = %msg, "stored backup blob malformed");
                BackupError::Authentication
            }
            CryptoError::Encryption(msg)
            | CryptoError::KeyDerivation(msg)
            | CryptoError::Hash(msg) => BackupError::Crypto(msg),
        }
    }
}

impl From<rusqlite::Error> for BackupError {
    fn from(err: rusqlite::Error) -> Self {
        BackupError::Persistence(err.to_string())
    }
}
