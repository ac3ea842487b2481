//! # credvault-core
//!
//! Core credential store for provider API keys:
//! - AES-256-GCM encryption of secrets with passphrase, keychain or ephemeral master keys
//! - Provider key format rules and masking
//! - Bounded, newest-first activity log of every attempted operation
//! - Provider probing over HTTP with timeout and retry
//! - Encrypted file persistence with an in-memory alternative

pub mod activity;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod probe;
pub mod stats;
pub mod storage;
mod vault;

pub use activity::{ActivityAction, ActivityEntry, ActivityLog, Actor};
pub use config::{ProbeSettings, Settings};
pub use credential::{
    Credential, CredentialDraft, CredentialStore, CredentialUpdate, Environment, Provider,
    ValidationResult,
};
pub use crypto::{KeySource, MasterKey, SecretString};
pub use error::{Result, VaultError};
pub use probe::{HttpProbe, ProviderProbe, StaticProbe};
pub use stats::UsageStats;
pub use storage::{EncryptedFileStorage, MemoryStorage, SecureStorage};
pub use vault::{Vault, VaultState};
