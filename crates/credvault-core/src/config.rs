//! Vault configuration
//!
//! Non-sensitive settings live in a plain JSON file (`settings.json` in the
//! data directory by default). Missing files and missing fields fall back to
//! defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::activity::DEFAULT_LOG_CAPACITY;
use crate::credential::CredentialDraft;
use crate::crypto::KeyDerivationParams;
use crate::error::{Result, VaultError};

/// Settings file name inside the data directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Default data directory for this platform
pub fn default_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("tech", "oka", "credvault")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| VaultError::ConfigError("could not determine data directory".to_string()))
}

fn static_url(s: &str) -> Url {
    Url::parse(s).expect("static provider URL is valid")
}

/// Outbound provider probe settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbeSettings {
    pub anthropic_base_url: Url,
    pub openai_base_url: Url,
    pub gemini_base_url: Url,
    /// Endpoint used to check `custom` keys; without one they cannot be probed
    pub custom_endpoint: Option<Url>,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Extra attempts after the first on 429/5xx/transport errors
    pub max_retries: u32,
    /// Initial backoff, doubled after every retry
    pub backoff_ms: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            anthropic_base_url: static_url("https://api.anthropic.com"),
            openai_base_url: static_url("https://api.openai.com"),
            gemini_base_url: static_url("https://generativelanguage.googleapis.com"),
            custom_endpoint: None,
            timeout_secs: 10,
            max_retries: 2,
            backoff_ms: 250,
        }
    }
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}

/// Vault settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub version: u32,
    /// Maximum activity log entries kept in memory
    pub log_capacity: usize,
    /// Upper bound for provider round-trips (validate / test)
    pub operation_timeout_secs: u64,
    pub kdf: KeyDerivationParams,
    pub probe: ProbeSettings,
    /// Credentials created on open when no credential with the same name
    /// exists. Never written back to disk.
    #[serde(skip_serializing)]
    pub seed: Vec<CredentialDraft>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 1,
            log_capacity: DEFAULT_LOG_CAPACITY,
            operation_timeout_secs: 30,
            kdf: KeyDerivationParams::default(),
            probe: ProbeSettings::default(),
            seed: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings, using defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        settings.validate()?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings atomically via a temp file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, path).await?;

        debug!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.operation_timeout_secs == 0 {
            return Err(VaultError::ConfigError(
                "operationTimeoutSecs must be greater than zero".to_string(),
            ));
        }
        if self.probe.timeout_secs == 0 {
            return Err(VaultError::ConfigError(
                "probe.timeoutSecs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}
