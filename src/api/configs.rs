//! `/api/sync` routes: sync config CRUD, execution and run history.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{path_id, query_param, ApiResult, AppState};
use crate::error::Error;
use crate::model::{NewSyncConfig, SyncConfig, SyncResult};
use crate::storage;
use crate::sync::SyncPhase;

const ACTOR: &str = "api";
const DEFAULT_RUNS: u32 = 20;
const MAX_RUNS: u32 = 200;

pub(super) async fn list_configs(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<SyncConfig>>> {
    let configs = storage::lock(state.engine.storage()).list_sync_configs()?;
    Ok(Json(configs))
}

pub(super) async fn create_config(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewSyncConfig>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(new) = body.map_err(|e| Error::Validation(e.body_text()))?;
    let config = storage::lock(state.engine.storage()).create_sync_config(&new, ACTOR)?;
    Ok((StatusCode::CREATED, Json(config)))
}

/// A config plus the phase of its in-flight run, if any.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ConfigStatus {
    #[serde(flatten)]
    config: SyncConfig,
    running: Option<SyncPhase>,
}

pub(super) async fn get_config(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<ConfigStatus>> {
    let id = path_id(id)?;
    let config = storage::lock(state.engine.storage()).require_sync_config(id)?;
    Ok(Json(ConfigStatus {
        config,
        running: state.engine.registry().phase(id),
    }))
}

/// Deleting a config while its sync runs is a conflict.
pub(super) async fn delete_config(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let id = path_id(id)?;
    let _guard = state.engine.registry().try_acquire(id)?;
    let deleted = storage::lock(state.engine.storage()).delete_sync_config(id, ACTOR)?;
    if !deleted {
        return Err(Error::SyncConfigNotFound { id }.into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// The run lives in its own task so a client disconnect cannot drop it
/// halfway; it still finishes and records its result.
pub(super) async fn execute(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<SyncResult>> {
    let id = path_id(id)?;
    let run = tokio::spawn(async move { state.engine.execute(id).await });
    let result = run
        .await
        .map_err(|e| Error::Other(format!("sync task for config {id} failed: {e}")))??;
    Ok(Json(result))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RunsParams {
    limit: Option<u32>,
}

/// Recent runs, newest first.
pub(super) async fn runs(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    params: Result<Query<RunsParams>, QueryRejection>,
) -> ApiResult<Json<Vec<SyncResult>>> {
    let id = path_id(id)?;
    let limit = query_param(params)?.limit.unwrap_or(DEFAULT_RUNS);
    if limit == 0 || limit > MAX_RUNS {
        return Err(Error::Validation(format!("limit must be between 1 and {MAX_RUNS}")).into());
    }
    let store = storage::lock(state.engine.storage());
    store.require_sync_config(id)?;
    Ok(Json(store.list_sync_runs(id, limit)?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RemoteInfo {
    base_url: String,
    organization: Option<String>,
    project: Option<String>,
    epic_id: Option<i64>,
    api_version: String,
    source: &'static str,
}

/// Configured remote defaults. Never includes the access token.
pub(super) async fn remote_info(State(state): State<Arc<AppState>>) -> Json<RemoteInfo> {
    let remote = &state.settings.remote;
    Json(RemoteInfo {
        base_url: remote.base_url.clone(),
        organization: remote.organization.clone(),
        project: remote.project.clone(),
        epic_id: remote.epic_id,
        api_version: remote.api_version.clone(),
        source: state.engine.source_name(),
    })
}
