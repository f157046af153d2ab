//! Command implementations.

pub mod ask;
pub mod completions;
pub mod config;
pub mod items;
pub mod serve;
pub mod sync;
pub mod version;

use std::path::PathBuf;

use crate::config::{resolve_db_path, Settings};
use crate::error::{Error, Result};
use crate::narrative::{BoxedNarrator, OpenAiNarrator};
use crate::remote::{AzureDevOpsClient, BoxedSource};
use crate::storage::{self, SharedStorage, SqliteStorage};

/// Open (creating if needed) the database.
fn open_storage(db_path: Option<&PathBuf>) -> Result<SharedStorage> {
    let path = resolve_db_path(db_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine database location; pass --db".into()))?;
    Ok(storage::shared(SqliteStorage::open(&path)?))
}

fn remote_source(settings: &Settings) -> Result<BoxedSource> {
    let client = AzureDevOpsClient::new(&settings.remote, settings.sync.retry)?
        .with_batch_size(settings.sync.batch_size);
    Ok(BoxedSource::new(client))
}

fn narrator(settings: &Settings) -> BoxedNarrator {
    BoxedNarrator::new(OpenAiNarrator::new(&settings.narrative))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/// Config to use when none was named: the lowest, else one bootstrapped
/// from settings.
fn resolve_config(
    storage: &SharedStorage,
    settings: &Settings,
    requested: Option<i64>,
) -> Result<i64> {
    if let Some(id) = requested {
        return Ok(id);
    }
    crate::sync::default_config(storage, &settings.remote)?
        .map(|config| config.id)
        .ok_or_else(|| {
            Error::Validation(
                "no sync config exists; run `epicsync config create` or set EPICSYNC_EPIC_ID"
                    .into(),
            )
        })
}

/// Truncate to `max` characters, marking the cut.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer title", 6), "a lon…");
    }
}
