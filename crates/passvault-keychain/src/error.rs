//! Keychain error types.
//!
//! Every public API in this crate returns [`KeychainError`]. The first three
//! variants are the recoverable taxonomy a collaborator is expected to act
//! on; the rest are precondition or provider failures.

/// Unified error type for the PassVault keychain.
#[derive(Debug, thiserror::Error)]
pub enum KeychainError {
    // -- Load / verification ------------------------------------------------
    /// The persisted representation is malformed.
    #[error("malformed keychain representation: {reason}")]
    Parse { reason: String },

    /// The representation does not hash to the trusted checksum.
    #[error("integrity check failed: representation does not match trusted checksum")]
    Integrity,

    /// An entry failed to authenticate under the derived cipher key.
    ///
    /// Wrong password and corrupted ciphertext are deliberately reported the
    /// same way.
    #[error("incorrect password or corrupted data")]
    Authentication,

    // -- Caller contract ----------------------------------------------------
    /// The master password exceeds [`MAX_PASSWORD_LENGTH`](crate::kdf::MAX_PASSWORD_LENGTH).
    #[error("master password exceeds {max} characters")]
    PasswordTooLong { max: usize },

    // -- Provider -----------------------------------------------------------
    /// The cryptographic provider failed (RNG, key import, sealing).
    #[error("crypto provider failure: {reason}")]
    Crypto { reason: String },

    /// JSON encoding of the representation failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KeychainError {
    pub(crate) fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    pub(crate) fn crypto(reason: impl Into<String>) -> Self {
        Self::Crypto {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the keychain crate.
pub type Result<T> = std::result::Result<T, KeychainError>;
