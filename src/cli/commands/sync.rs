//! Sync command implementations.

use crate::cli::SyncCommands;
use crate::config::load_settings;
use crate::error::Result;
use crate::model::{SyncResult, SyncStatus};
use crate::storage;
use crate::sync::SyncEngine;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Output for sync history.
#[derive(Serialize)]
struct HistoryOutput {
    runs: Vec<SyncResult>,
    count: usize,
}

/// Execute sync commands.
///
/// # Errors
///
/// Returns an error if the run or the history lookup fails.
pub fn execute(command: &SyncCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    match command {
        SyncCommands::Run { id } => run(*id, db_path, json),
        SyncCommands::History { id, limit } => history(*id, *limit, db_path, json),
    }
}

fn run(id: i64, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let settings = load_settings()?;
    let storage = super::open_storage(db_path)?;
    let source = super::remote_source(&settings)?;

    let token = CancellationToken::new();
    let engine = SyncEngine::new(storage, source, settings.sync.clone())
        .with_cancellation(token.clone());

    let result = super::runtime()?.block_on(async move {
        let watcher = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Cancelling sync");
                watcher.cancel();
            }
        });
        engine.execute(id).await
    })?;

    if json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn history(id: i64, limit: u32, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = super::open_storage(db_path)?;
    let runs = {
        let store = storage::lock(&storage);
        store.require_sync_config(id)?;
        store.list_sync_runs(id, limit.max(1))?
    };

    if json {
        let output = HistoryOutput {
            count: runs.len(),
            runs,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("No runs yet for config {id}.");
        return Ok(());
    }
    for run in &runs {
        let status = match run.status {
            SyncStatus::Completed => run.status.as_str().green(),
            SyncStatus::Failed => run.status.as_str().red(),
        };
        println!(
            "{}  {:<9}  +{} ~{} -{}  {} comments  {}",
            run.started_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            status,
            run.items_added,
            run.items_updated,
            run.items_deleted,
            run.comments_synced,
            run.duration,
        );
        if let Some(error) = &run.error {
            println!("    {}", error.dimmed());
        }
    }
    Ok(())
}

fn print_result(result: &SyncResult) {
    println!(
        "{} config {} in {}",
        "Synced".green().bold(),
        result.sync_config_id,
        result.duration
    );
    println!("  Added:    {}", result.items_added);
    println!("  Updated:  {}", result.items_updated);
    println!("  Deleted:  {}", result.items_deleted);
    println!("  Comments: {}", result.comments_synced);
}
