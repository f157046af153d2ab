//! `/api/workitems` routes: mirror queries and smart search.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use super::{path_id, query_param, ApiResult, AppState, ConfigParam};
use crate::error::Error;
use crate::model::{SmartSearchResult, StateCounts, WorkItem, WorkItemComment, WorkItemMetadata};
use crate::query::parse_filter;

pub(super) async fn list(
    State(state): State<Arc<AppState>>,
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> ApiResult<Json<Vec<WorkItem>>> {
    let params = query_param(params)?;
    let filter = parse_filter(&params, |requested| state.resolve_config(requested))?;
    Ok(Json(state.query.search(&filter)?))
}

pub(super) async fn metadata(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ConfigParam>, QueryRejection>,
) -> ApiResult<Json<WorkItemMetadata>> {
    let id = config_id(&state, params)?;
    Ok(Json(state.query.metadata(id)?))
}

pub(super) async fn counts(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ConfigParam>, QueryRejection>,
) -> ApiResult<Json<StateCounts>> {
    let id = config_id(&state, params)?;
    Ok(Json(state.query.state_counts(id)?))
}

pub(super) async fn get_item(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    params: Result<Query<ConfigParam>, QueryRejection>,
) -> ApiResult<Json<WorkItem>> {
    let item_id = path_id(id)?;
    let config = config_id(&state, params)?;
    Ok(Json(state.query.get(config, item_id)?))
}

pub(super) async fn children(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    params: Result<Query<ConfigParam>, QueryRejection>,
) -> ApiResult<Json<Vec<WorkItem>>> {
    let item_id = path_id(id)?;
    let config = config_id(&state, params)?;
    Ok(Json(state.query.children(config, item_id)?))
}

pub(super) async fn comments(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    params: Result<Query<ConfigParam>, QueryRejection>,
) -> ApiResult<Json<Vec<WorkItemComment>>> {
    let item_id = path_id(id)?;
    let config = config_id(&state, params)?;
    Ok(Json(state.query.comments(config, item_id)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SmartSearchRequest {
    query: String,
    #[serde(default)]
    sync_config_id: Option<i64>,
}

/// Body is `{"query": "...", "syncConfigId": n}` or the bare query text.
/// A `syncConfigId` in the body wins over the query string.
pub(super) async fn smart_search(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ConfigParam>, QueryRejection>,
    body: Bytes,
) -> ApiResult<Json<SmartSearchResult>> {
    let param = query_param(params)?.sync_config_id;
    let text = std::str::from_utf8(&body)
        .map_err(|_| Error::Validation("request body must be UTF-8".into()))?;

    let request = if text.trim_start().starts_with('{') {
        serde_json::from_str::<SmartSearchRequest>(text)
            .map_err(|e| Error::Validation(format!("invalid smart search body: {e}")))?
    } else {
        SmartSearchRequest {
            query: text.to_string(),
            sync_config_id: None,
        }
    };

    let config = state.resolve_config(request.sync_config_id.or(param))?;
    Ok(Json(state.search.search(&request.query, config).await?))
}

/// Resolve `syncConfigId`, falling back to the default config, and check it
/// exists.
fn config_id(
    state: &AppState,
    params: Result<Query<ConfigParam>, QueryRejection>,
) -> ApiResult<i64> {
    let requested = query_param(params)?.sync_config_id;
    let id = state.resolve_config(requested)?;
    state.query.config(id)?;
    Ok(id)
}
