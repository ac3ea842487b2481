//! Vault lifecycle: key resolution, persistence and the open store

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::activity::Actor;
use crate::config::Settings;
use crate::credential::{CredentialDraft, CredentialStore};
use crate::crypto::{KeySource, MasterKey};
use crate::error::{Result, VaultError};
use crate::probe::ProviderProbe;
use crate::storage::{EncryptedFileStorage, MemoryStorage, SecureStorage};

/// Vault state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// Key resolved, credentials loaded, store available
    Open,
    /// Store and master key dropped
    Closed,
}

/// An opened credential store plus the key material and persistence behind it
pub struct Vault {
    data_dir: Option<PathBuf>,
    store: RwLock<Option<Arc<CredentialStore>>>,
}

impl Vault {
    /// Open a persistent vault in `data_dir`.
    ///
    /// Resolves the master key, checks it against the directory, loads the
    /// stored credentials and creates any seed credential whose name is not
    /// taken yet.
    pub async fn open(
        data_dir: impl Into<PathBuf>,
        settings: &Settings,
        key_source: &KeySource,
        probe: Arc<dyn ProviderProbe>,
    ) -> Result<Self> {
        let data_dir = data_dir.into();
        settings.validate()?;
        if !key_source.is_persistent() {
            warn!("Ephemeral key on {:?}: credentials will not survive a restart", data_dir);
        }

        let master_key = key_source.resolve(Some(data_dir.as_path()), &settings.kdf).await?;
        let storage = EncryptedFileStorage::open(&data_dir, master_key.clone()).await?;

        let store = build_store(Arc::new(storage), master_key, probe, settings);
        let report = store.load().await?;
        if !report.skipped.is_empty() {
            warn!(
                "{} stored credentials could not be decoded and were skipped",
                report.skipped.len()
            );
        }
        apply_seed(&store, &settings.seed).await;

        info!("Vault opened at {:?} ({:?})", data_dir, key_source);
        Ok(Self {
            data_dir: Some(data_dir),
            store: RwLock::new(Some(Arc::new(store))),
        })
    }

    /// Open an empty vault that lives only in memory, under an ephemeral key
    pub async fn in_memory(settings: &Settings, probe: Arc<dyn ProviderProbe>) -> Result<Self> {
        settings.validate()?;

        let store = build_store(
            Arc::new(MemoryStorage::new()),
            MasterKey::generate(),
            probe,
            settings,
        );
        apply_seed(&store, &settings.seed).await;

        info!("In-memory vault opened");
        Ok(Self {
            data_dir: None,
            store: RwLock::new(Some(Arc::new(store))),
        })
    }

    pub async fn state(&self) -> VaultState {
        if self.store.read().await.is_some() {
            VaultState::Open
        } else {
            VaultState::Closed
        }
    }

    /// The open store
    pub async fn store(&self) -> Result<Arc<CredentialStore>> {
        self.store.read().await.clone().ok_or(VaultError::Closed)
    }

    /// `None` for in-memory vaults
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Drop the store and its master key. Calls already holding the store
    /// finish first; later `store()` calls fail with `Closed`.
    pub async fn close(&self) {
        if self.store.write().await.take().is_some() {
            info!("Vault closed");
        } else {
            debug!("Vault already closed");
        }
    }
}

fn build_store(
    storage: Arc<dyn SecureStorage>,
    master_key: MasterKey,
    probe: Arc<dyn ProviderProbe>,
    settings: &Settings,
) -> CredentialStore {
    CredentialStore::new(storage, master_key, probe)
        .with_log_capacity(settings.log_capacity)
        .with_operation_timeout(settings.operation_timeout())
}

async fn apply_seed(store: &CredentialStore, seed: &[CredentialDraft]) {
    let actor = Actor::system();
    for draft in seed {
        if store.contains_name(&draft.name).await {
            debug!("Seed credential '{}' already present", draft.name);
            continue;
        }
        if let Err(e) = store.create(draft.clone(), &actor).await {
            warn!("Skipping seed credential '{}': {}", draft.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Provider;
    use crate::crypto::KeyDerivationParams;
    use crate::probe::StaticProbe;
    use tempfile::TempDir;

    const KEY: &str = "sk-ant-REDACTED";

    fn fast_settings() -> Settings {
        Settings {
            kdf: KeyDerivationParams::fast(),
            ..Settings::default()
        }
    }

    fn probe() -> Arc<dyn ProviderProbe> {
        Arc::new(StaticProbe::accepting())
    }

    #[tokio::test]
    async fn test_reopen_keeps_credentials_and_usage() {
        let temp = TempDir::new().unwrap();
        let settings = fast_settings();
        let key = KeySource::passphrase("correct horse");

        let vault = Vault::open(temp.path(), &settings, &key, probe()).await.unwrap();
        let store = vault.store().await.unwrap();
        let cred = store
            .create(CredentialDraft::new("claude", Provider::Anthropic, KEY), &Actor::system())
            .await
            .unwrap();
        store.reveal(cred.id, &Actor::system()).await.unwrap();
        store.reveal(cred.id, &Actor::system()).await.unwrap();
        drop(store);
        vault.close().await;

        let reopened = Vault::open(temp.path(), &settings, &key, probe()).await.unwrap();
        let store = reopened.store().await.unwrap();
        let loaded = store.get(cred.id).await.unwrap();
        assert_eq!(loaded.usage_count, 2);
        assert_eq!(loaded.name, "claude");

        let secret = store.reveal(cred.id, &Actor::system()).await.unwrap().unwrap();
        assert_eq!(secret.expose(), KEY);
    }

    #[tokio::test]
    async fn test_tampered_record_does_not_block_open() {
        let temp = TempDir::new().unwrap();
        let settings = fast_settings();
        let key = KeySource::passphrase("pw");

        let vault = Vault::open(temp.path(), &settings, &key, probe()).await.unwrap();
        let store = vault.store().await.unwrap();
        let actor = Actor::system();
        let kept = store
            .create(CredentialDraft::new("kept", Provider::Custom, "custom-key-0123456789"), &actor)
            .await
            .unwrap();
        let lost = store
            .create(CredentialDraft::new("lost", Provider::Custom, "custom-key-9876543210"), &actor)
            .await
            .unwrap();
        drop(store);
        vault.close().await;

        let path = temp.path().join("vault.json");
        let mut file: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        file["entries"][format!("credential:{}", lost.id)] = "00:00:00".into();
        std::fs::write(&path, file.to_string()).unwrap();

        let reopened = Vault::open(temp.path(), &settings, &key, probe()).await.unwrap();
        let store = reopened.store().await.unwrap();
        assert!(store.get(kept.id).await.is_some());
        assert!(store.get(lost.id).await.is_none());

        let secret = store.reveal(kept.id, &actor).await.unwrap().unwrap();
        assert_eq!(secret.expose(), "custom-key-0123456789");
    }

    #[tokio::test]
    async fn test_wrong_passphrase() {
        let temp = TempDir::new().unwrap();
        let settings = fast_settings();

        Vault::open(temp.path(), &settings, &KeySource::passphrase("right"), probe())
            .await
            .unwrap();

        let result =
            Vault::open(temp.path(), &settings, &KeySource::passphrase("wrong"), probe()).await;
        assert!(matches!(result, Err(VaultError::InvalidPassphrase)));
    }

    #[tokio::test]
    async fn test_closed_vault_refuses_store() {
        let vault = Vault::in_memory(&fast_settings(), probe()).await.unwrap();
        assert_eq!(vault.state().await, VaultState::Open);
        assert!(vault.data_dir().is_none());

        vault.close().await;
        assert_eq!(vault.state().await, VaultState::Closed);
        assert!(matches!(vault.store().await, Err(VaultError::Closed)));
    }

    #[tokio::test]
    async fn test_seed_applied_once() {
        let temp = TempDir::new().unwrap();
        let mut settings = fast_settings();
        settings.seed = vec![
            CredentialDraft::new("seeded", Provider::Anthropic, KEY),
            CredentialDraft::new("broken", Provider::OpenAi, "nope"),
        ];
        let key = KeySource::passphrase("pw");

        let vault = Vault::open(temp.path(), &settings, &key, probe()).await.unwrap();
        let names: Vec<_> = vault
            .store()
            .await
            .unwrap()
            .list()
            .await
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["seeded"]);
        vault.close().await;

        let vault = Vault::open(temp.path(), &settings, &key, probe()).await.unwrap();
        assert_eq!(vault.store().await.unwrap().list().await.len(), 1);
    }
}
