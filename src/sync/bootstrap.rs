//! Default sync config bootstrap.

use tracing::info;

use crate::config::RemoteSettings;
use crate::error::Result;
use crate::model::{NewSyncConfig, SyncConfig};
use crate::storage::{self, SharedStorage};

/// Return the lowest-numbered sync config, creating one from the configured
/// epic, organization and project when none exists yet.
///
/// Returns `None` when there are no configs and the remote settings do not
/// name a complete default.
///
/// # Errors
///
/// Returns an error if the store cannot be read or written.
pub fn default_config(
    storage: &SharedStorage,
    remote: &RemoteSettings,
) -> Result<Option<SyncConfig>> {
    let mut store = storage::lock(storage);
    if let Some(existing) = store.list_sync_configs()?.into_iter().min_by_key(|c| c.id) {
        return Ok(Some(existing));
    }

    let (Some(epic_id), Some(organization), Some(project)) = (
        remote.epic_id,
        remote.organization.clone(),
        remote.project.clone(),
    ) else {
        return Ok(None);
    };

    let new = NewSyncConfig {
        name: format!("Epic {epic_id}"),
        epic_id,
        organization,
        project,
    };
    new.validate()?;
    let created = store.create_sync_config(&new, "bootstrap")?;
    info!(config_id = created.id, epic_id, "Created default sync config");
    Ok(Some(created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    fn remote(epic_id: Option<i64>) -> RemoteSettings {
        RemoteSettings {
            organization: Some("contoso".into()),
            project: Some("Alpha".into()),
            epic_id,
            ..RemoteSettings::default()
        }
    }

    #[test]
    fn test_creates_once_then_reuses() {
        let shared = storage::shared(SqliteStorage::open_memory().unwrap());
        let first = default_config(&shared, &remote(Some(42))).unwrap().unwrap();
        assert_eq!(first.epic_id, 42);
        assert_eq!(first.name, "Epic 42");

        let again = default_config(&shared, &remote(Some(7))).unwrap().unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(storage::lock(&shared).list_sync_configs().unwrap().len(), 1);
    }

    #[test]
    fn test_incomplete_settings_create_nothing() {
        let shared = storage::shared(SqliteStorage::open_memory().unwrap());
        assert!(default_config(&shared, &remote(None)).unwrap().is_none());
        assert!(storage::lock(&shared).list_sync_configs().unwrap().is_empty());
    }
}
