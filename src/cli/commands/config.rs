//! Sync config command implementations.

use crate::cli::ConfigCommands;
use crate::config::load_settings;
use crate::error::{Error, Result};
use crate::model::{NewSyncConfig, StateCounts, SyncConfig};
use crate::storage;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

const ACTOR: &str = "cli";

/// Output for config list.
#[derive(Serialize)]
struct ConfigListOutput {
    configs: Vec<SyncConfig>,
    count: usize,
}

/// Output for config show.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigShowOutput {
    config: SyncConfig,
    counts: StateCounts,
}

/// Output for config delete.
#[derive(Serialize)]
struct DeleteOutput {
    id: i64,
    deleted: bool,
}

/// Execute config commands.
///
/// # Errors
///
/// Returns an error if the config is invalid, missing, or the store fails.
pub fn execute(command: &ConfigCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    match command {
        ConfigCommands::List => list(db_path, json),
        ConfigCommands::Show { id } => show(*id, db_path, json),
        ConfigCommands::Create {
            name,
            epic_id,
            organization,
            project,
        } => create(
            name,
            *epic_id,
            organization.as_deref(),
            project.as_deref(),
            db_path,
            json,
        ),
        ConfigCommands::Delete { id } => delete(*id, db_path, json),
    }
}

fn list(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = super::open_storage(db_path)?;
    let configs = storage::lock(&storage).list_sync_configs()?;

    if json {
        let output = ConfigListOutput {
            count: configs.len(),
            configs,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if configs.is_empty() {
        println!("No sync configs. Create one with `epicsync config create`.");
        return Ok(());
    }
    for config in &configs {
        print_config_line(config);
    }
    Ok(())
}

fn show(id: i64, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = super::open_storage(db_path)?;
    let (config, counts) = {
        let store = storage::lock(&storage);
        (store.require_sync_config(id)?, store.state_counts(id)?)
    };

    if json {
        println!("{}", serde_json::to_string(&ConfigShowOutput { config, counts })?);
        return Ok(());
    }

    print_config_line(&config);
    println!("  Organization: {}", config.organization);
    println!("  Project:      {}", config.project);
    println!("  Created:      {}", config.created_at.format("%Y-%m-%d %H:%M"));
    println!("  Items:        {}", counts.total);
    for (state, count) in &counts.by_state {
        println!("    {state}: {count}");
    }
    Ok(())
}

fn create(
    name: &str,
    epic_id: i64,
    organization: Option<&str>,
    project: Option<&str>,
    db_path: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let settings = load_settings()?;
    let organization = organization
        .map(str::to_string)
        .or(settings.remote.organization)
        .ok_or_else(|| {
            Error::Validation("--organization is required (or set AZURE_DEVOPS_ORGANIZATION)".into())
        })?;
    let project = project
        .map(str::to_string)
        .or(settings.remote.project)
        .ok_or_else(|| {
            Error::Validation("--project is required (or set AZURE_DEVOPS_PROJECT)".into())
        })?;

    let storage = super::open_storage(db_path)?;
    let config = storage::lock(&storage).create_sync_config(
        &NewSyncConfig {
            name: name.to_string(),
            epic_id,
            organization,
            project,
        },
        ACTOR,
    )?;

    if json {
        println!("{}", serde_json::to_string(&config)?);
    } else {
        println!("{} sync config {}", "Created".green().bold(), config.id);
        print_config_line(&config);
    }
    Ok(())
}

fn delete(id: i64, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = super::open_storage(db_path)?;
    let deleted = storage::lock(&storage).delete_sync_config(id, ACTOR)?;
    if !deleted {
        return Err(Error::SyncConfigNotFound { id });
    }

    if json {
        println!("{}", serde_json::to_string(&DeleteOutput { id, deleted })?);
    } else {
        println!("{} sync config {id}", "Deleted".green().bold());
    }
    Ok(())
}

fn print_config_line(config: &SyncConfig) {
    let synced = config.last_synced.map_or_else(
        || "never synced".to_string(),
        |t| format!("synced {}", t.format("%Y-%m-%d %H:%M")),
    );
    println!(
        "{} {} {} {}",
        format!("[{}]", config.id).dimmed(),
        config.name.bold(),
        format!("epic #{}", config.epic_id).cyan(),
        format!("({}/{}, {synced})", config.organization, config.project).dimmed(),
    );
}
