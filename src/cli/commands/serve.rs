//! Serve command: run the HTTP API.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::api::{self, AppState};
use crate::config::{load_settings, resolve_bind_addr};
use crate::error::Result;

/// Execute the serve command. Blocks until Ctrl-C.
///
/// # Errors
///
/// Returns an error if settings are invalid, the database cannot be opened,
/// or the address cannot be bound.
pub fn execute(bind: Option<&str>, sync_on_start: bool, db_path: Option<&PathBuf>) -> Result<()> {
    let settings = load_settings()?;
    let addr = resolve_bind_addr(bind, &settings)?;
    let sync_on_start = sync_on_start || settings.server.sync_on_start;

    let storage = super::open_storage(db_path)?;
    let source = super::remote_source(&settings)?;
    let narrator = super::narrator(&settings);
    info!(source = source.name(), sync_on_start, "Starting server");

    let state = Arc::new(AppState::new(storage, source, narrator, settings));
    super::runtime()?.block_on(api::serve(state, addr, sync_on_start))
}
