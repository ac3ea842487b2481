//! Credential store: the authoritative collection plus its activity log
//!
//! Every mutation holds the collection write lock from validation through
//! commit, so racing updates and deletes on the same id are serialized.
//! Records are persisted before they replace the in-memory copy, and the
//! activity entry is appended synchronously right after the insert. A
//! future dropped while the storage write is in flight may leave the record
//! on disk but not in memory; it then reappears on the next `load` without
//! an activity entry.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::format::{infer_key_type, validate_secret};
use super::mask::mask_secret;
use super::types::{
    Credential, CredentialDraft, CredentialUpdate, StoredCredential, UsageSnapshot,
    ValidationResult,
};
use crate::activity::{ActivityAction, ActivityEntry, ActivityLog, Actor, DEFAULT_LOG_CAPACITY};
use crate::crypto::{decrypt_string, encrypt_string, MasterKey, SecretString};
use crate::error::{Result, VaultError};
use crate::probe::ProviderProbe;
use crate::stats::{monthly_uses, UsageStats};
use crate::storage::SecureStorage;

/// Storage key prefix for credentials
const CREDENTIAL_PREFIX: &str = "credential:";

/// Name recorded for operations on ids the store does not know
const UNKNOWN_NAME: &str = "unknown";

/// Default bound on provider round-trips
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of [`CredentialStore::load`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    /// Storage keys of records that could not be decoded
    pub skipped: Vec<String>,
}

/// Credential store
pub struct CredentialStore {
    /// Live collection in creation order
    credentials: RwLock<IndexMap<Uuid, StoredCredential>>,
    activity: ActivityLog,
    storage: Arc<dyn SecureStorage>,
    master_key: MasterKey,
    probe: Arc<dyn ProviderProbe>,
    operation_timeout: Duration,
}

impl CredentialStore {
    pub fn new(
        storage: Arc<dyn SecureStorage>,
        master_key: MasterKey,
        probe: Arc<dyn ProviderProbe>,
    ) -> Self {
        Self {
            credentials: RwLock::new(IndexMap::new()),
            activity: ActivityLog::new(DEFAULT_LOG_CAPACITY),
            storage,
            master_key,
            probe,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Replace the activity log with an empty one of the given capacity
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.activity = ActivityLog::new(capacity);
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Load persisted credentials, replacing the in-memory collection.
    ///
    /// Records that cannot be decoded are skipped with a warning so the rest
    /// stay reachable; their storage keys are returned.
    pub async fn load(&self) -> Result<LoadReport> {
        let keys = self.storage.list_keys(CREDENTIAL_PREFIX).await?;

        let mut loaded = Vec::with_capacity(keys.len());
        let mut skipped = Vec::new();
        for key in keys {
            let decoded = match self.storage.retrieve(&key).await {
                Ok(Some(data)) => serde_json::from_slice::<StoredCredential>(&data)
                    .map_err(VaultError::from),
                Ok(None) => {
                    warn!("Credential key exists but no data: {}", key);
                    continue;
                }
                Err(e) => Err(e),
            };

            match decoded {
                Ok(stored) => loaded.push(stored),
                Err(e @ (VaultError::DecodeFailed(_) | VaultError::SerializationError(_))) => {
                    warn!("Skipping unreadable credential {}: {}", key, e);
                    skipped.push(key);
                }
                Err(e) => return Err(e),
            }
        }
        loaded.sort_by_key(|s| s.credential.created_at);

        let mut credentials = self.credentials.write().await;
        *credentials = loaded
            .into_iter()
            .map(|s| (s.credential.id, s))
            .collect();

        info!(
            "Loaded {} credentials from {} ({} skipped)",
            credentials.len(),
            self.storage.backend_name(),
            skipped.len()
        );
        Ok(LoadReport {
            loaded: credentials.len(),
            skipped,
        })
    }

    /// All credentials, masked, in creation order
    pub async fn list(&self) -> Vec<Credential> {
        let credentials = self.credentials.read().await;
        credentials.values().map(|s| s.credential.clone()).collect()
    }

    pub async fn get(&self, id: Uuid) -> Option<Credential> {
        let credentials = self.credentials.read().await;
        credentials.get(&id).map(|s| s.credential.clone())
    }

    pub async fn contains_name(&self, name: &str) -> bool {
        let credentials = self.credentials.read().await;
        name_taken(&credentials, name.trim(), None)
    }

    /// Decrypt the secret of an active credential and record the use.
    ///
    /// Missing or inactive credentials yield `None`, leave the usage counter
    /// untouched and are logged as failed uses.
    pub async fn reveal(&self, id: Uuid, actor: &Actor) -> Result<Option<SecretString>> {
        let mut credentials = self.credentials.write().await;

        let Some(stored) = credentials.get(&id) else {
            debug!("Reveal of unknown credential {}", id);
            let reason = "credential not found";
            self.record_failure(ActivityAction::Used, id, UNKNOWN_NAME, actor, reason);
            return Ok(None);
        };
        let name = stored.credential.name.clone();

        if !stored.credential.is_active {
            self.record_failure(ActivityAction::Used, id, &name, actor, "credential is inactive");
            return Ok(None);
        }

        let secret = match decrypt_string(&stored.encrypted_value, &self.master_key) {
            Ok(secret) => secret,
            Err(e) => {
                self.record_failure(ActivityAction::Used, id, &name, actor, &e);
                return Err(e);
            }
        };

        let mut updated = stored.clone();
        updated.credential.usage_count = updated.credential.usage_count.saturating_add(1);
        updated.credential.last_used_at = Some(Utc::now());

        if let Err(e) = self.persist(&updated).await {
            self.record_failure(ActivityAction::Used, id, &name, actor, &e);
            return Err(e);
        }

        let usage_count = updated.credential.usage_count;
        credentials.insert(id, updated);
        self.activity.append(
            ActivityEntry::success(ActivityAction::Used, id, &name, actor)
                .with_metadata(json!({ "usageCount": usage_count })),
        );

        debug!("Revealed credential {} (use #{})", id, usage_count);
        Ok(Some(secret))
    }

    /// Validate and add a new credential
    pub async fn create(&self, draft: CredentialDraft, actor: &Actor) -> Result<Credential> {
        let mut credentials = self.credentials.write().await;
        let name = draft.name.trim().to_string();

        let stored = match self.build_credential(&credentials, &name, &draft) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Rejected credential '{}': {}", name, e);
                self.record_failure(ActivityAction::Created, Uuid::nil(), &name, actor, &e);
                return Err(e);
            }
        };
        let id = stored.credential.id;

        if let Err(e) = self.persist(&stored).await {
            self.record_failure(ActivityAction::Created, id, &name, actor, &e);
            return Err(e);
        }

        let credential = stored.credential.clone();
        credentials.insert(id, stored);
        self.activity.append(
            ActivityEntry::success(ActivityAction::Created, id, &name, actor).with_metadata(json!({
                "provider": credential.provider,
                "environment": credential.environment,
            })),
        );

        info!("Created credential: {} ({})", credential.name, credential.provider);
        Ok(credential)
    }

    fn build_credential(
        &self,
        credentials: &IndexMap<Uuid, StoredCredential>,
        name: &str,
        draft: &CredentialDraft,
    ) -> Result<StoredCredential> {
        check_name(credentials, name, None)?;
        validate_secret(draft.provider, &draft.secret)?;

        let now = Utc::now();
        let credential = Credential {
            id: Uuid::new_v4(),
            name: name.to_string(),
            provider: draft.provider,
            masked_key: mask_secret(&draft.secret),
            is_active: draft.is_active,
            environment: draft.environment,
            labels: clean_labels(&draft.labels),
            description: draft.description.clone(),
            monthly_limit: draft.monthly_limit,
            usage_count: 0,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        };

        Ok(StoredCredential {
            credential,
            encrypted_value: encrypt_string(&draft.secret, &self.master_key)?,
        })
    }

    /// Apply partial changes to an existing credential
    pub async fn update(
        &self,
        id: Uuid,
        changes: CredentialUpdate,
        actor: &Actor,
    ) -> Result<Credential> {
        let mut credentials = self.credentials.write().await;

        let Some(existing) = credentials.get(&id) else {
            let e = VaultError::NotFound(id.to_string());
            self.record_failure(ActivityAction::Updated, id, UNKNOWN_NAME, actor, &e);
            return Err(e);
        };
        let name = existing.credential.name.clone();

        let updated = match self.merge_update(&credentials, existing, &changes) {
            Ok(updated) => updated,
            Err(e) => {
                warn!("Rejected update of '{}': {}", name, e);
                self.record_failure(ActivityAction::Updated, id, &name, actor, &e);
                return Err(e);
            }
        };

        if let Err(e) = self.persist(&updated).await {
            self.record_failure(ActivityAction::Updated, id, &name, actor, &e);
            return Err(e);
        }

        let credential = updated.credential.clone();
        credentials.insert(id, updated);
        self.activity.append(
            ActivityEntry::success(ActivityAction::Updated, id, &credential.name, actor)
                .with_metadata(json!({ "fields": changes.changed_fields() })),
        );

        info!("Updated credential: {}", credential.name);
        Ok(credential)
    }

    fn merge_update(
        &self,
        credentials: &IndexMap<Uuid, StoredCredential>,
        existing: &StoredCredential,
        changes: &CredentialUpdate,
    ) -> Result<StoredCredential> {
        let mut updated = existing.clone();
        let record = &mut updated.credential;

        if let Some(name) = &changes.name {
            let name = name.trim();
            check_name(credentials, name, Some(record.id))?;
            record.name = name.to_string();
        }

        let provider = changes.provider.unwrap_or(record.provider);
        if changes.needs_format_check() {
            match &changes.secret {
                Some(secret) => validate_secret(provider, secret)?,
                None => {
                    let current = decrypt_string(&existing.encrypted_value, &self.master_key)?;
                    validate_secret(provider, current.expose())?;
                }
            }
        }
        record.provider = provider;

        if let Some(secret) = &changes.secret {
            updated.encrypted_value = encrypt_string(secret, &self.master_key)?;
            record.masked_key = mask_secret(secret);
        }
        if let Some(is_active) = changes.is_active {
            record.is_active = is_active;
        }
        if let Some(environment) = changes.environment {
            record.environment = environment;
        }
        if let Some(labels) = &changes.labels {
            record.labels = clean_labels(labels);
        }
        if let Some(description) = &changes.description {
            record.description = description.clone();
        }
        if let Some(monthly_limit) = changes.monthly_limit {
            record.monthly_limit = monthly_limit;
        }
        record.updated_at = Utc::now();

        Ok(updated)
    }

    /// Remove a credential. Its log entries stay.
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<()> {
        let mut credentials = self.credentials.write().await;

        let Some(name) = credentials.get(&id).map(|s| s.credential.name.clone()) else {
            let e = VaultError::NotFound(id.to_string());
            self.record_failure(ActivityAction::Deleted, id, UNKNOWN_NAME, actor, &e);
            return Err(e);
        };

        if let Err(e) = self.storage.delete(&storage_key(id)).await {
            self.record_failure(ActivityAction::Deleted, id, &name, actor, &e);
            return Err(e);
        }

        credentials.shift_remove(&id);
        self.activity
            .append(ActivityEntry::success(ActivityAction::Deleted, id, &name, actor));

        info!("Deleted credential: {}", name);
        Ok(())
    }

    /// Check a key against its provider
    pub async fn validate(&self, id: Uuid, actor: &Actor) -> Result<ValidationResult> {
        let (credential, secret) = self
            .open_for_probe(id, ActivityAction::Validated, actor)
            .await?;
        let provider = credential.provider;

        let report = match self.bounded(self.probe.verify(provider, secret.expose())).await {
            Ok(report) => report,
            Err(VaultError::ProbeError(reason)) => crate::probe::ProbeReport::rejected(reason),
            Err(e) => {
                self.record_failure(ActivityAction::Validated, id, &credential.name, actor, &e);
                return Err(e);
            }
        };

        let used_this_month =
            self.activity
                .with_entries(|entries| monthly_uses(id, entries.iter(), Utc::now()));
        let result = ValidationResult {
            valid: report.valid,
            provider,
            key_type: infer_key_type(provider, secret.expose()).to_string(),
            permissions: report.permissions,
            expires_at: report.expires_at,
            usage: Some(UsageSnapshot {
                usage_count: credential.usage_count,
                monthly_limit: credential.monthly_limit,
                remaining: credential
                    .monthly_limit
                    .map(|limit| limit.saturating_sub(used_this_month)),
            }),
            error: report.error,
        };

        let entry = if result.valid {
            ActivityEntry::success(ActivityAction::Validated, id, &credential.name, actor)
        } else {
            let reason = result.error.as_deref().unwrap_or("key rejected");
            ActivityEntry::failure(ActivityAction::Validated, id, &credential.name, actor, reason)
        };
        self.activity
            .append(entry.with_metadata(json!({ "keyType": result.key_type })));

        info!(
            "Validated credential {}: {}",
            credential.name,
            if result.valid { "valid" } else { "invalid" }
        );
        Ok(result)
    }

    /// Connectivity check with the stored key
    pub async fn test_connection(&self, id: Uuid, actor: &Actor) -> Result<bool> {
        let (credential, secret) = self.open_for_probe(id, ActivityAction::Tested, actor).await?;

        let outcome = self
            .bounded(self.probe.ping(credential.provider, secret.expose()))
            .await;
        let entry = match &outcome {
            Ok(true) => ActivityEntry::success(ActivityAction::Tested, id, &credential.name, actor),
            Ok(false) => ActivityEntry::failure(
                ActivityAction::Tested,
                id,
                &credential.name,
                actor,
                "provider did not accept the request",
            ),
            Err(e) => ActivityEntry::failure(ActivityAction::Tested, id, &credential.name, actor, e),
        };
        self.activity.append(entry);

        match outcome {
            Ok(connected) => {
                info!("Connection test for {}: {}", credential.name, connected);
                Ok(connected)
            }
            Err(VaultError::ProbeError(reason)) => {
                warn!("Connection test for {} failed: {}", credential.name, reason);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Snapshot a credential and decrypt its secret for an outbound probe.
    /// The collection lock is released before returning.
    async fn open_for_probe(
        &self,
        id: Uuid,
        action: ActivityAction,
        actor: &Actor,
    ) -> Result<(Credential, SecretString)> {
        let credentials = self.credentials.read().await;

        let Some(stored) = credentials.get(&id) else {
            let e = VaultError::NotFound(id.to_string());
            self.record_failure(action, id, UNKNOWN_NAME, actor, &e);
            return Err(e);
        };

        match decrypt_string(&stored.encrypted_value, &self.master_key) {
            Ok(secret) => Ok((stored.credential.clone(), secret)),
            Err(e) => {
                self.record_failure(action, id, &stored.credential.name, actor, &e);
                Err(e)
            }
        }
    }

    /// Newest-first activity, optionally for one credential
    pub fn logs(&self, credential_id: Option<Uuid>, limit: usize) -> Vec<ActivityEntry> {
        self.activity.snapshot(credential_id, limit)
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub async fn usage_stats(&self) -> UsageStats {
        let credentials = self.list().await;
        self.activity
            .with_entries(|entries| UsageStats::compute(&credentials, entries.iter(), Utc::now()))
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.operation_timeout, fut)
            .await
            .map_err(|_| VaultError::Timeout(self.operation_timeout.as_secs()))?
    }

    async fn persist(&self, stored: &StoredCredential) -> Result<()> {
        let data = serde_json::to_vec(stored)?;
        self.storage
            .store(&storage_key(stored.credential.id), &data)
            .await
    }

    fn record_failure(
        &self,
        action: ActivityAction,
        id: Uuid,
        name: &str,
        actor: &Actor,
        error: impl std::fmt::Display,
    ) {
        self.activity
            .append(ActivityEntry::failure(action, id, name, actor, error));
    }
}

fn storage_key(id: Uuid) -> String {
    format!("{}{}", CREDENTIAL_PREFIX, id)
}

fn name_taken(
    credentials: &IndexMap<Uuid, StoredCredential>,
    name: &str,
    except: Option<Uuid>,
) -> bool {
    credentials
        .values()
        .any(|s| Some(s.credential.id) != except && s.credential.name == name)
}

fn check_name(
    credentials: &IndexMap<Uuid, StoredCredential>,
    name: &str,
    except: Option<Uuid>,
) -> Result<()> {
    if name.is_empty() {
        return Err(VaultError::ValidationFailed("name must not be empty".to_string()));
    }
    if name_taken(credentials, name, except) {
        return Err(VaultError::ValidationFailed(format!(
            "a credential named '{}' already exists",
            name
        )));
    }
    Ok(())
}

fn clean_labels(labels: &BTreeSet<String>) -> BTreeSet<String> {
    labels
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
