//! Activity log entry types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of operation recorded in the activity log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Created,
    Updated,
    Deleted,
    Used,
    Validated,
    Tested,
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Used => "used",
            Self::Validated => "validated",
            Self::Tested => "tested",
        };
        f.write_str(s)
    }
}

/// Who performed an operation. Supplied by the caller's auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user: String,
    pub address: Option<String>,
}

impl Actor {
    pub fn new(user: impl Into<String>, address: Option<String>) -> Self {
        Self {
            user: user.into(),
            address,
        }
    }

    /// Actor for operations the vault performs on its own (seeding)
    pub fn system() -> Self {
        Self::new("system", None)
    }
}

impl Default for Actor {
    fn default() -> Self {
        Self::system()
    }
}

/// One immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: Uuid,
    pub credential_id: Uuid,
    /// Kept alongside the id so history reads well after deletion
    pub credential_name: String,
    pub action: ActivityAction,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub address: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl ActivityEntry {
    pub fn success(
        action: ActivityAction,
        credential_id: Uuid,
        credential_name: &str,
        actor: &Actor,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            credential_id,
            credential_name: credential_name.to_string(),
            action,
            timestamp: Utc::now(),
            user: actor.user.clone(),
            address: actor.address.clone(),
            success: true,
            error: None,
            metadata: None,
        }
    }

    pub fn failure(
        action: ActivityAction,
        credential_id: Uuid,
        credential_name: &str,
        actor: &Actor,
        error: impl fmt::Display,
    ) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::success(action, credential_id, credential_name, actor)
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
