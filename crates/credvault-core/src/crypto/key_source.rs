//! Where the vault master key comes from
//!
//! - Passphrase: Argon2id over a salt kept in the data directory
//! - Keychain: random key held by the OS keychain (macOS Keychain, Windows
//!   Credential Manager, Linux Secret Service)
//! - Ephemeral: random key that lives only as long as the process

use std::path::Path;

use keyring::Entry;
use tracing::{debug, info};

use super::{derive_key, generate_salt, KeyDerivationParams, MasterKey, SecretString};
use crate::error::{Result, VaultError};

/// Salt file name inside the data directory
pub const SALT_FILE: &str = "salt";

/// Master key source
pub enum KeySource {
    Passphrase(SecretString),
    Keychain { service: String, account: String },
    Ephemeral,
}

impl KeySource {
    pub fn passphrase(passphrase: impl Into<String>) -> Self {
        Self::Passphrase(SecretString::new(passphrase.into()))
    }

    /// Keychain entry under the default service name
    pub fn keychain(account: impl Into<String>) -> Self {
        Self::Keychain {
            service: "credvault".to_string(),
            account: account.into(),
        }
    }

    /// Produce the master key. Passphrase sources need a data directory for
    /// the salt; a missing salt is created on first use.
    pub async fn resolve(
        &self,
        data_dir: Option<&Path>,
        params: &KeyDerivationParams,
    ) -> Result<MasterKey> {
        match self {
            Self::Passphrase(passphrase) => {
                let dir = data_dir.ok_or_else(|| {
                    VaultError::ConfigError(
                        "passphrase keys need a data directory for the salt".to_string(),
                    )
                })?;
                let salt = load_or_create_salt(dir).await?;
                derive_key(passphrase.expose(), &salt, params)
            }
            Self::Keychain { service, account } => keychain_key(service, account),
            Self::Ephemeral => {
                debug!("Using ephemeral master key");
                Ok(MasterKey::generate())
            }
        }
    }

    pub fn is_persistent(&self) -> bool {
        !matches!(self, Self::Ephemeral)
    }
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passphrase(_) => f.write_str("Passphrase([REDACTED])"),
            Self::Keychain { service, account } => f
                .debug_struct("Keychain")
                .field("service", service)
                .field("account", account)
                .finish(),
            Self::Ephemeral => f.write_str("Ephemeral"),
        }
    }
}

async fn load_or_create_salt(dir: &Path) -> Result<String> {
    let path = dir.join(SALT_FILE);

    if tokio::fs::try_exists(&path).await? {
        let salt = tokio::fs::read_to_string(&path).await?;
        return Ok(salt.trim().to_string());
    }

    tokio::fs::create_dir_all(dir).await?;
    let salt = generate_salt();
    tokio::fs::write(&path, &salt).await?;
    debug!("Created salt at {:?}", path);
    Ok(salt)
}

fn keychain_key(service: &str, account: &str) -> Result<MasterKey> {
    let entry =
        Entry::new(service, account).map_err(|e| VaultError::KeychainError(e.to_string()))?;

    match entry.get_password() {
        Ok(encoded) => {
            debug!("Loaded master key from keychain ({}/{})", service, account);
            MasterKey::from_base64(&encoded)
        }
        Err(keyring::Error::NoEntry) => {
            let key = MasterKey::generate();
            entry
                .set_password(&key.to_base64())
                .map_err(|e| VaultError::KeychainError(e.to_string()))?;
            info!("Stored new master key in keychain ({}/{})", service, account);
            Ok(key)
        }
        Err(e) => Err(VaultError::KeychainError(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_passphrase_key_is_stable_across_resolves() {
        let dir = TempDir::new().unwrap();
        let params = KeyDerivationParams::fast();
        let source = KeySource::passphrase("hunter2");

        let first = source.resolve(Some(dir.path()), &params).await.unwrap();
        assert!(dir.path().join(SALT_FILE).exists());

        let second = source.resolve(Some(dir.path()), &params).await.unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[tokio::test]
    async fn test_passphrase_without_dir() {
        let result = KeySource::passphrase("pw")
            .resolve(None, &KeyDerivationParams::fast())
            .await;
        assert!(matches!(result, Err(VaultError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_ephemeral_keys_are_fresh() {
        let params = KeyDerivationParams::fast();
        let a = KeySource::Ephemeral.resolve(None, &params).await.unwrap();
        let b = KeySource::Ephemeral.resolve(None, &params).await.unwrap();

        assert_ne!(a.as_bytes(), b.as_bytes());
        assert!(!KeySource::Ephemeral.is_persistent());
    }

    #[test]
    fn test_debug_hides_passphrase() {
        let debug = format!("{:?}", KeySource::passphrase("top-secret"));
        assert!(!debug.contains("top-secret"));
    }
}
