//! Error types for credvault-core

use thiserror::Error;

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Credential not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to decode stored secret: {0}")]
    DecodeFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionError(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationError(String),

    #[error("Keychain error: {0}")]
    KeychainError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid passphrase")]
    InvalidPassphrase,

    #[error("Vault is closed")]
    Closed,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Provider probe failed: {0}")]
    ProbeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl VaultError {
    /// Short machine-readable kind, used by the activity log and the HTTP layer
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::ValidationFailed(_) => "validation_failed",
            Self::DecodeFailed(_) => "decode_failed",
            Self::EncryptionError(_) => "encryption_error",
            Self::KeyDerivationError(_) => "key_derivation_error",
            Self::KeychainError(_) => "keychain_error",
            Self::StorageError(_) => "storage_error",
            Self::InvalidPassphrase => "invalid_passphrase",
            Self::Closed => "closed",
            Self::Timeout(_) => "timeout",
            Self::ProbeError(_) => "probe_error",
            Self::ConfigError(_) => "config_error",
            Self::IoError(_) => "io_error",
            Self::SerializationError(_) => "serialization_error",
        }
    }
}
