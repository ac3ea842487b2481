//! Aggregate usage view over the credential collection and activity log

use chrono::{DateTime, Datelike, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::{ActivityAction, ActivityEntry};
use crate::credential::{Credential, Provider};

/// Number of log entries included in `recent_activity`
pub const RECENT_ACTIVITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub total_keys: usize,
    pub active_keys: usize,
    /// Sum of usage counters across stored credentials
    pub total_usage: u64,
    /// Successful reveals logged in the current calendar month (UTC)
    pub monthly_usage: usize,
    /// Credential count per provider, largest first
    pub by_provider: IndexMap<Provider, usize>,
    pub recent_activity: Vec<ActivityEntry>,
}

impl UsageStats {
    /// Build stats from credentials and newest-first log entries
    pub fn compute<'a>(
        credentials: &[Credential],
        entries: impl IntoIterator<Item = &'a ActivityEntry>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut by_provider: IndexMap<Provider, usize> = IndexMap::new();
        for credential in credentials {
            *by_provider.entry(credential.provider).or_default() += 1;
        }
        // stable sort keeps first-seen order between equal counts
        by_provider.sort_by(|_, a, _, b| b.cmp(a));

        let mut monthly_usage = 0;
        let mut recent_activity = Vec::with_capacity(RECENT_ACTIVITY);
        for entry in entries {
            if recent_activity.len() < RECENT_ACTIVITY {
                recent_activity.push(entry.clone());
            }
            if is_monthly_use(entry, now) {
                monthly_usage += 1;
            }
        }

        Self {
            total_keys: credentials.len(),
            active_keys: credentials.iter().filter(|c| c.is_active).count(),
            total_usage: credentials.iter().map(|c| c.usage_count).sum(),
            monthly_usage,
            by_provider,
            recent_activity,
        }
    }
}

fn same_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

fn is_monthly_use(entry: &ActivityEntry, now: DateTime<Utc>) -> bool {
    entry.action == ActivityAction::Used && entry.success && same_month(entry.timestamp, now)
}

/// Successful reveals of one credential in the current month
pub fn monthly_uses<'a>(
    credential_id: Uuid,
    entries: impl IntoIterator<Item = &'a ActivityEntry>,
    now: DateTime<Utc>,
) -> u64 {
    entries
        .into_iter()
        .filter(|e| e.credential_id == credential_id && is_monthly_use(e, now))
        .count() as u64
}
