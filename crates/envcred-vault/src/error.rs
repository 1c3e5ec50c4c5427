//! Vault error types.
//!
//! Every public API in this crate returns [`VaultError`]. Lookups that miss
//! are not errors: they return `None`.

use envcred_store::StoreError;

/// Unified error type for the credential vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // -- Crypto errors ------------------------------------------------------
    /// Encryption failed (e.g. invalid key length, ring internal error).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// Decryption failed (e.g. wrong key, corrupted ciphertext, bad nonce).
    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },

    // -- Credential errors --------------------------------------------------
    /// No environment was given and no current environment is configured.
    #[error("no environment given for credential {credential} and no current environment set")]
    NoEnvironment { credential: String },

    /// A stored credential record could not be interpreted.
    #[error("malformed credential record {environment}/{credential}: {reason}")]
    MalformedRecord {
        environment: String,
        credential: String,
        reason: String,
    },

    // -- Configuration errors -----------------------------------------------
    /// The vault configuration is unusable.
    #[error("invalid vault configuration: {reason}")]
    InvalidConfig { reason: String },

    /// TOML configuration could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // -- Underlying errors --------------------------------------------------
    /// Persistent storage failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error (reading the config file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // -- Generic ------------------------------------------------------------
    /// Catch-all for unexpected internal errors. Prefer a typed variant.
    #[error("internal vault error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;
