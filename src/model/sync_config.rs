//! Sync configuration: which Epic tree is mirrored, and from where.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A configured mirror of one Epic and its descendants.
///
/// `last_synced` only moves after a reconciliation run commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    pub id: i64,
    pub name: String,
    /// Root work item of the mirrored tree.
    pub epic_id: i64,
    pub organization: String,
    pub project: String,
    pub last_synced: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// What happens to mirrored items that drop out of the remote tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeletionPolicy {
    /// Delete the row and its comments.
    #[default]
    Hard,
    /// Keep the row and comments, mark `deleted_at`, hide from queries.
    Tombstone,
}

impl DeletionPolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Tombstone => "tombstone",
        }
    }

    /// Parse a policy name.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for anything other than `hard` or `tombstone`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hard" | "delete" => Ok(Self::Hard),
            "tombstone" | "soft" => Ok(Self::Tombstone),
            other => Err(Error::Config(format!(
                "unknown deletion policy '{other}' (expected 'hard' or 'tombstone')"
            ))),
        }
    }
}

/// Request body for creating a sync config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSyncConfig {
    pub name: String,
    pub epic_id: i64,
    #[serde(alias = "orgName")]
    pub organization: String,
    pub project: String,
}

impl NewSyncConfig {
    /// Check required fields before anything is written.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty".into()));
        }
        if self.epic_id <= 0 {
            return Err(Error::Validation(format!(
                "epicId must be a positive work item id, got {}",
                self.epic_id
            )));
        }
        if self.organization.trim().is_empty() {
            return Err(Error::Validation("organization must not be empty".into()));
        }
        if self.project.trim().is_empty() {
            return Err(Error::Validation("project must not be empty".into()));
        }
        Ok(())
    }
}
