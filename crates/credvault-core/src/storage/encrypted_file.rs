//! Encrypted file storage backend
//!
//! Keeps every entry in one JSON file inside the data directory. Each value
//! is sealed individually with AES-256-GCM under the vault master key, so
//! credential metadata is protected as well as the secrets themselves.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use super::SecureStorage;
use crate::crypto::{decrypt, decrypt_string, encrypt, encrypt_string, MasterKey, SealedSecret};
use crate::error::{Result, VaultError};

const STORAGE_FILE: &str = "vault.json";
const VERIFY_FILE: &str = "verify";
const VERIFY_PLAINTEXT: &str = "credvault-verification";
const FORMAT_VERSION: u32 = 1;

/// File format for persistent storage
#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageFile {
    version: u32,
    entries: BTreeMap<String, String>,
}

/// Encrypted JSON file backend
pub struct EncryptedFileStorage {
    storage_dir: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
    master_key: MasterKey,
}

impl EncryptedFileStorage {
    /// Open the storage in `storage_dir`, creating it if needed.
    ///
    /// A fresh directory records a verification token for `master_key`; an
    /// existing one must accept the key or `InvalidPassphrase` is returned.
    pub async fn open(storage_dir: impl Into<PathBuf>, master_key: MasterKey) -> Result<Self> {
        let storage_dir = storage_dir.into();
        tokio::fs::create_dir_all(&storage_dir).await?;

        let storage = Self {
            storage_dir,
            entries: RwLock::new(BTreeMap::new()),
            master_key,
        };

        if storage.is_initialized().await? {
            if !storage.verify_key().await? {
                return Err(VaultError::InvalidPassphrase);
            }
        } else {
            storage.save_verification().await?;
        }

        storage.load().await?;
        debug!("Encrypted file storage opened at {:?}", storage.storage_dir);
        Ok(storage)
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn storage_file_path(&self) -> PathBuf {
        self.storage_dir.join(STORAGE_FILE)
    }

    fn verification_file_path(&self) -> PathBuf {
        self.storage_dir.join(VERIFY_FILE)
    }

    async fn is_initialized(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.verification_file_path()).await?)
    }

    async fn save_verification(&self) -> Result<()> {
        let token = encrypt_string(VERIFY_PLAINTEXT, &self.master_key)?;
        tokio::fs::write(self.verification_file_path(), token).await?;
        debug!("Saved verification token");
        Ok(())
    }

    async fn verify_key(&self) -> Result<bool> {
        let token = tokio::fs::read_to_string(self.verification_file_path()).await?;
        Ok(matches!(
            decrypt_string(token.trim(), &self.master_key),
            Ok(plain) if plain.expose() == VERIFY_PLAINTEXT
        ))
    }

    async fn load(&self) -> Result<()> {
        let path = self.storage_file_path();
        if !tokio::fs::try_exists(&path).await? {
            debug!("No existing storage file");
            return Ok(());
        }

        let contents = tokio::fs::read_to_string(&path).await?;
        let file: StorageFile = serde_json::from_str(&contents)?;
        if file.version != FORMAT_VERSION {
            return Err(VaultError::StorageError(format!(
                "unsupported storage version {}",
                file.version
            )));
        }

        let mut entries = self.entries.write().await;
        *entries = file.entries;
        debug!("Loaded {} entries from storage", entries.len());
        Ok(())
    }

    /// Write the file atomically via a temp file. Callers hold the write lock
    /// so concurrent saves cannot interleave.
    async fn save(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let file = StorageFile {
            version: FORMAT_VERSION,
            entries: entries.clone(),
        };
        let contents = serde_json::to_string_pretty(&file)?;

        let path = self.storage_file_path();
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        debug!("Saved {} entries to storage", entries.len());
        Ok(())
    }
}

#[async_trait]
impl SecureStorage for EncryptedFileStorage {
    async fn store(&self, key: &str, value: &[u8]) -> Result<()> {
        let sealed = encrypt(value, &self.master_key)?.to_string();

        let mut entries = self.entries.write().await;
        let previous = entries.insert(key.to_string(), sealed);
        if let Err(e) = self.save(&entries).await {
            // keep memory consistent with what is on disk
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }

        debug!("Stored key: {}", key);
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(sealed) => {
                let sealed: SealedSecret = sealed.parse()?;
                Ok(Some(decrypt(&sealed, &self.master_key)?))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        if let Some(old) = entries.remove(key) {
            if let Err(e) = self.save(&entries).await {
                entries.insert(key.to_string(), old);
                return Err(e);
            }
            debug!("Deleted key: {}", key);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.save(&entries).await
    }

    fn backend_name(&self) -> &'static str {
        "Encrypted File Storage"
    }
}
