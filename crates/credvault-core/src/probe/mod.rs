//! Provider round-trips used by validate and connection tests

mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::credential::Provider;
use crate::error::{Result, VaultError};

pub use http::HttpProbe;

/// What a provider said about a key
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProbeReport {
    pub valid: bool,
    pub permissions: Option<Vec<String>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ProbeReport {
    pub fn accepted(permissions: Vec<String>) -> Self {
        Self {
            valid: true,
            permissions: Some(permissions),
            ..Self::default()
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// Outbound checks against a provider API.
///
/// `Err` means the provider could not be reached; a reachable provider that
/// refuses the key is `Ok` with `valid == false`.
#[async_trait]
pub trait ProviderProbe: Send + Sync {
    /// Check that the key is accepted and report what it can do
    async fn verify(&self, provider: Provider, secret: &str) -> Result<ProbeReport>;

    /// Check that an authenticated request gets through
    async fn ping(&self, provider: Provider, secret: &str) -> Result<bool>;
}

/// Probe with fixed answers, for tests and offline deployments
#[derive(Debug)]
pub struct StaticProbe {
    outcome: StaticOutcome,
    calls: AtomicUsize,
}

#[derive(Debug, Clone)]
enum StaticOutcome {
    Accept,
    Reject(String),
    Unreachable(String),
}

impl StaticProbe {
    pub fn accepting() -> Self {
        Self::with(StaticOutcome::Accept)
    }

    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self::with(StaticOutcome::Reject(reason.into()))
    }

    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::with(StaticOutcome::Unreachable(reason.into()))
    }

    fn with(outcome: StaticOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of verify/ping calls seen so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderProbe for StaticProbe {
    async fn verify(&self, _provider: Provider, _secret: &str) -> Result<ProbeReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            StaticOutcome::Accept => Ok(ProbeReport::accepted(vec!["models:read".to_string()])),
            StaticOutcome::Reject(reason) => Ok(ProbeReport::rejected(reason.clone())),
            StaticOutcome::Unreachable(reason) => Err(VaultError::ProbeError(reason.clone())),
        }
    }

    async fn ping(&self, _provider: Provider, _secret: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            StaticOutcome::Accept => Ok(true),
            StaticOutcome::Reject(_) => Ok(false),
            StaticOutcome::Unreachable(reason) => Err(VaultError::ProbeError(reason.clone())),
        }
    }
}
