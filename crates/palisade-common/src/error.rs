//! Common error types for Palisade components.

use thiserror::Error;

/// Common errors across Palisade components
#[derive(Debug, Error)]
pub enum PalisadeError {
    /// Configuration error (fatal at construction, never deferred)
    #[error("Configuration error: {0}")]
    Config(String),

    /// State token could not be decrypted.
    ///
    /// Deliberately carries no detail: expired, tampered, malformed, and
    /// purged-key tokens are indistinguishable to the caller.
    #[error("Cannot decrypt state")]
    CannotDecrypt,

    /// CAPTCHA challenge generation error
    #[error("CAPTCHA error: {0}")]
    Captcha(String),

    /// Credential storage/verification error
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised by the credential repository.
///
/// `UserNotFound` and `WrongPassword` stay distinct at this level so the
/// repository is testable; the validation pipeline collapses both into one
/// opaque failure before anything leaves the process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// A username, password, or salt below the minimum length floor
    #[error("{field} must be at least {minimum} characters")]
    TooShort { field: &'static str, minimum: usize },

    /// No record for the hashed username
    #[error("no such user")]
    UserNotFound,

    /// Record exists but the salted hash does not match
    #[error("password mismatch")]
    WrongPassword,
}
