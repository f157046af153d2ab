//! Ask command: smart search from the terminal.

use std::path::PathBuf;

use colored::Colorize;

use crate::config::load_settings;
use crate::error::Result;
use crate::model::ResponseType;
use crate::query::QueryService;
use crate::search::SmartSearch;

/// Execute the ask command.
///
/// # Errors
///
/// Returns an error if the query is empty, no config exists, or the
/// narrative call fails or times out.
pub fn execute(query: &str, config: Option<i64>, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let settings = load_settings()?;
    let storage = super::open_storage(db_path)?;
    let config_id = super::resolve_config(&storage, &settings, config)?;

    let search = SmartSearch::new(
        QueryService::new(storage),
        super::narrator(&settings),
        settings.narrative.timeout,
    );
    let result = super::runtime()?.block_on(search.search(query, config_id))?;

    if json {
        println!("{}", serde_json::to_string(&result)?);
        return Ok(());
    }

    match result.response_type {
        ResponseType::List => {
            if result.items.is_empty() {
                println!("No matching work items.");
            } else {
                super::items::print_items(&result.items);
            }
        }
        ResponseType::Narrative => {
            println!("{}", result.narrative.as_deref().unwrap_or_default());
            if !result.items.is_empty() {
                println!();
                println!("{}", "Evidence".cyan().bold());
                super::items::print_items(&result.items);
            }
        }
    }
    println!("{}", result.explanation.dimmed());
    Ok(())
}
