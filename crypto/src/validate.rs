//! Secret format validation.
//!
//! Rejections here are caller errors, never security events: the caller
//! corrects the input and retries.

use thiserror::Error;

/// Required PIN length in digits.
pub const PIN_LENGTH: usize = 6;

/// Minimum passphrase length in characters.
pub const MIN_PASSPHRASE_LENGTH: usize = 8;

/// Maximum passphrase length in characters.
pub const MAX_PASSPHRASE_LENGTH: usize = 128;

/// Which kind of secret protects a backup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretKind {
    /// Exactly six numeric digits.
    Pin,
    /// Free-form passphrase with minimum complexity.
    Passphrase,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SecretFormatError {
    #[error("PIN must be exactly 6 digits")]
    PinLength,
    #[error("PIN must contain only digits")]
    PinNotNumeric,
    #[error("passphrase must be at least 8 characters")]
    PassphraseTooShort,
    #[error("passphrase must be at most 128 characters")]
    PassphraseTooLong,
    #[error("passphrase must contain at least one letter")]
    PassphraseNoLetter,
    #[error("passphrase must contain at least one number")]
    PassphraseNoDigit,
}

/// Validate a PIN: exactly [`PIN_LENGTH`] ASCII digits.
pub fn validate_pin(pin: &str) -> Result<(), SecretFormatError> {
    if pin.chars().count() != PIN_LENGTH {
        return Err(SecretFormatError::PinLength);
    }
    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(SecretFormatError::PinNotNumeric);
    }
    Ok(())
}

/// Validate a passphrase: length bounds plus at least one letter and one
/// digit.
pub fn validate_passphrase(passphrase: &str) -> Result<(), SecretFormatError> {
    let length = passphrase.chars().count();
    if length < MIN_PASSPHRASE_LENGTH {
        return Err(SecretFormatError::PassphraseTooShort);
    }
    if length > MAX_PASSPHRASE_LENGTH {
        return Err(SecretFormatError::PassphraseTooLong);
    }
    if !passphrase.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(SecretFormatError::PassphraseNoLetter);
    }
    if !passphrase.chars().any(|c| c.is_ascii_digit()) {
        return Err(SecretFormatError::PassphraseNoDigit);
    }
    Ok(())
}

/// Dispatch validation on the secret kind.
pub fn validate_secret(kind: SecretKind, secret: &str) -> Result<(), SecretFormatError> {
    match kind {
        SecretKind::Pin => validate_pin(secret),
        SecretKind::Passphrase => validate_passphrase(secret),
    }
}
