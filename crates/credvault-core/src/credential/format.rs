//! Provider key format rules
//!
//! Every provider requires a literal prefix followed by a minimum number of
//! `[A-Za-z0-9_-]` characters. Custom keys have no prefix. The values below
//! are placeholders and should be checked against current provider docs.

use std::sync::OnceLock;

use regex::Regex;

use super::types::Provider;
use crate::error::{Result, VaultError};

/// Prefix and minimum remainder length for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatRule {
    pub prefix: &'static str,
    pub min_len: usize,
}

impl FormatRule {
    pub const fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::Anthropic => Self {
                prefix: "sk-ant-",
                min_len: 32,
            },
            Provider::OpenAi => Self {
                prefix: "sk-",
                min_len: 32,
            },
            Provider::Gemini => Self {
                prefix: "AIza",
                min_len: 35,
            },
            Provider::Custom => Self {
                prefix: "",
                min_len: 16,
            },
        }
    }

    fn pattern(&self) -> String {
        format!("^{}[A-Za-z0-9_-]{{{},}}$", regex::escape(self.prefix), self.min_len)
    }

    fn describe(&self, provider: Provider) -> String {
        if self.prefix.is_empty() {
            format!(
                "{} keys must be at least {} letters, digits, '_' or '-'",
                provider, self.min_len
            )
        } else {
            format!(
                "{} keys must start with \"{}\" followed by at least {} letters, digits, '_' or '-'",
                provider, self.prefix, self.min_len
            )
        }
    }
}

fn patterns() -> &'static [Regex; 4] {
    static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        Provider::ALL.map(|p| {
            Regex::new(&FormatRule::for_provider(p).pattern())
                .unwrap_or_else(|e| panic!("format rule for {} is not a valid regex: {}", p, e))
        })
    })
}

fn pattern_for(provider: Provider) -> &'static Regex {
    let index = Provider::ALL
        .iter()
        .position(|p| *p == provider)
        .unwrap_or(Provider::ALL.len() - 1);
    &patterns()[index]
}

/// Check a secret against its provider's rule
pub fn validate_secret(provider: Provider, secret: &str) -> Result<()> {
    if pattern_for(provider).is_match(secret) {
        Ok(())
    } else {
        Err(VaultError::ValidationFailed(format!(
            "invalid key format: {}",
            FormatRule::for_provider(provider).describe(provider)
        )))
    }
}

/// Best-effort key type from well-known sub-prefixes
pub fn infer_key_type(provider: Provider, secret: &str) -> &'static str {
    match provider {
        Provider::Anthropic if secret.starts_with("sk-ant-admin") => "admin",
        Provider::Anthropic => "api",
        Provider::OpenAi if secret.starts_with("sk-proj-") => "project",
        Provider::OpenAi if secret.starts_with("sk-svcacct-") => "service_account",
        Provider::OpenAi if secret.starts_with("sk-admin-") => "admin",
        Provider::OpenAi => "user",
        Provider::Gemini => "api_key",
        Provider::Custom => "custom",
    }
}
