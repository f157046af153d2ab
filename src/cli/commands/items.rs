//! Items command: structured mirror queries.

use std::collections::HashMap;
use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;

use crate::cli::ItemsArgs;
use crate::config::load_settings;
use crate::error::Result;
use crate::model::WorkItem;
use crate::query::{parse_filter, QueryService};

/// Output for items list.
#[derive(Serialize)]
struct ItemsOutput {
    items: Vec<WorkItem>,
    count: usize,
}

/// Execute the items command.
///
/// Flags go through the same validation as the HTTP query string.
///
/// # Errors
///
/// Returns `Error::Validation` for bad sort or paging values, or a store
/// error.
pub fn execute(args: &ItemsArgs, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let settings = load_settings()?;
    let storage = super::open_storage(db_path)?;

    let filter = parse_filter(&to_params(args), |requested| {
        super::resolve_config(&storage, &settings, requested.or(args.config))
    })?;
    let items = QueryService::new(storage).search(&filter)?;

    if json {
        let output = ItemsOutput {
            count: items.len(),
            items,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No matching work items.");
        return Ok(());
    }
    print_items(&items);
    let applied = filter.describe();
    if !applied.is_empty() {
        println!("{}", format!("{} item(s), {applied}", items.len()).dimmed());
    }
    Ok(())
}

fn to_params(args: &ItemsArgs) -> HashMap<String, String> {
    let pairs = [
        ("type", args.work_item_type.clone()),
        ("state", args.state.clone()),
        ("assignedTo", args.assigned_to.clone()),
        ("iterationPath", args.iteration.clone()),
        ("q", args.q.clone()),
        ("sortBy", args.sort_by.clone()),
        ("sortDir", args.sort_dir.clone()),
        ("limit", args.limit.map(|v| v.to_string())),
        ("offset", args.offset.map(|v| v.to_string())),
    ];
    pairs
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect()
}

/// One line per item: id, type, state, title, assignee.
pub(super) fn print_items(items: &[WorkItem]) {
    for item in items {
        println!(
            "{} {} {} {} {}",
            format!("#{:<7}", item.id).cyan(),
            format!("[{}]", item.work_item_type).dimmed(),
            format!("{:<12}", item.state).yellow(),
            super::truncate(&item.title, 70),
            item.assigned_to.as_deref().unwrap_or("-").dimmed(),
        );
    }
}
