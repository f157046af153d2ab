//! Per-config run exclusion.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::{Error, Result};

/// Where a run currently is.
///
/// `Fetching -> Diffing -> Applying -> Completed`, or `Failed` from any
/// non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Fetching,
    Diffing,
    Applying,
    Completed,
    Failed,
}

impl SyncPhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Diffing => "diffing",
            Self::Applying => "applying",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks which configs have a run in flight.
///
/// Cloning shares the same registry.
#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    active: Arc<Mutex<HashMap<i64, SyncPhase>>>,
}

impl RunRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<i64, SyncPhase>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `sync_config_id` for a new run, starting in `Fetching`.
    ///
    /// # Errors
    ///
    /// Returns `Error::SyncConflict` if a run is already in flight.
    pub fn try_acquire(&self, sync_config_id: i64) -> Result<RunGuard> {
        let mut active = self.entries();
        if active.contains_key(&sync_config_id) {
            return Err(Error::SyncConflict { sync_config_id });
        }
        active.insert(sync_config_id, SyncPhase::Fetching);
        Ok(RunGuard {
            registry: self.clone(),
            sync_config_id,
        })
    }

    /// Current phase of an in-flight run.
    #[must_use]
    pub fn phase(&self, sync_config_id: i64) -> Option<SyncPhase> {
        self.entries().get(&sync_config_id).copied()
    }

    #[must_use]
    pub fn is_running(&self, sync_config_id: i64) -> bool {
        self.entries().contains_key(&sync_config_id)
    }
}

/// Holds a config's run slot; released on drop.
#[derive(Debug)]
pub struct RunGuard {
    registry: RunRegistry,
    sync_config_id: i64,
}

impl RunGuard {
    /// Record a phase transition.
    pub fn advance(&self, phase: SyncPhase) {
        tracing::debug!(config_id = self.sync_config_id, %phase, "Sync phase");
        self.registry.entries().insert(self.sync_config_id, phase);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.entries().remove(&self.sync_config_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_conflicts_until_released() {
        let registry = RunRegistry::new();
        let guard = registry.try_acquire(1).unwrap();
        assert!(matches!(
            registry.try_acquire(1),
            Err(Error::SyncConflict { sync_config_id: 1 })
        ));
        // Other configs are independent.
        let other = registry.try_acquire(2).unwrap();

        guard.advance(SyncPhase::Applying);
        assert_eq!(registry.phase(1), Some(SyncPhase::Applying));

        drop(guard);
        assert!(!registry.is_running(1));
        assert!(registry.try_acquire(1).is_ok());
        drop(other);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(SyncPhase::Fetching.to_string(), "fetching");
        assert_eq!(serde_json::to_value(SyncPhase::Applying).unwrap(), "applying");
    }
}
