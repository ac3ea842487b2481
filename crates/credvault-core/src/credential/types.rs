//! Credential type definitions

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::VaultError;

/// External AI service a credential authenticates against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    OpenAi,
    Gemini,
    Custom,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Anthropic,
        Provider::OpenAi,
        Provider::Gemini,
        Provider::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| VaultError::ValidationFailed(format!("unknown provider: {}", s)))
    }
}

/// Deployment environment tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Credential metadata (safe to display - the secret only appears masked)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: Uuid,
    /// Unique across the store
    pub name: String,
    pub provider: Provider,
    /// First/last four characters of the secret, e.g. `sk-a********wxyz`
    pub masked_key: String,
    pub is_active: bool,
    pub environment: Environment,
    pub labels: BTreeSet<String>,
    pub description: Option<String>,
    pub monthly_limit: Option<u64>,
    /// Number of reveals; never decreases
    pub usage_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted form: metadata plus the sealed secret
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredential {
    pub credential: Credential,
    /// Sealed value (nonce:tag:ciphertext)
    pub encrypted_value: String,
}

/// Input for creating a credential
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDraft {
    pub name: String,
    pub provider: Provider,
    pub secret: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub monthly_limit: Option<u64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CredentialDraft {
    pub fn new(name: impl Into<String>, provider: Provider, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider,
            secret: secret.into(),
            description: None,
            environment: Environment::default(),
            labels: BTreeSet::new(),
            monthly_limit: None,
            is_active: true,
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_monthly_limit(mut self, limit: u64) -> Self {
        self.monthly_limit = Some(limit);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

impl fmt::Debug for CredentialDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialDraft")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("secret", &"[REDACTED]")
            .field("environment", &self.environment)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// Partial changes for an existing credential.
///
/// `description` and `monthly_limit` are double options: absent leaves the
/// field alone, `null` clears it.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub labels: Option<BTreeSet<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub monthly_limit: Option<Option<u64>>,
}

impl CredentialUpdate {
    /// True when the stored secret has to be checked against a format rule again
    pub fn needs_format_check(&self) -> bool {
        self.secret.is_some() || self.provider.is_some()
    }

    /// Field names touched by this update, for activity metadata
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.provider.is_some() {
            fields.push("provider");
        }
        if self.secret.is_some() {
            fields.push("secret");
        }
        if self.is_active.is_some() {
            fields.push("isActive");
        }
        if self.environment.is_some() {
            fields.push("environment");
        }
        if self.labels.is_some() {
            fields.push("labels");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.monthly_limit.is_some() {
            fields.push("monthlyLimit");
        }
        fields
    }
}

impl fmt::Debug for CredentialUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialUpdate")
            .field("fields", &self.changed_fields())
            .finish()
    }
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Usage numbers attached to a validation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub usage_count: u64,
    pub monthly_limit: Option<u64>,
    pub remaining: Option<u64>,
}

/// Outcome of checking a key against its provider (not persisted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub provider: Provider,
    pub key_type: String,
    pub permissions: Option<Vec<String>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage: Option<UsageSnapshot>,
    pub error: Option<String>,
}
