//! HTTP API.
//!
//! JSON in, JSON out. Every failure is `{ "error": string }` with the status
//! from [`Error::http_status`], including extractor rejections and unknown
//! routes.

mod configs;
mod workitems;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::narrative::BoxedNarrator;
use crate::query::QueryService;
use crate::remote::BoxedSource;
use crate::search::SmartSearch;
use crate::storage::{self, SharedStorage};
use crate::sync::{self, SyncEngine};

/// Shared state behind every handler.
pub struct AppState {
    pub engine: SyncEngine,
    pub query: QueryService,
    pub search: SmartSearch,
    pub settings: Settings,
}

impl AppState {
    /// Wire the engine, query service and interpreter over one store.
    #[must_use]
    pub fn new(
        storage: SharedStorage,
        source: BoxedSource,
        narrator: BoxedNarrator,
        settings: Settings,
    ) -> Self {
        let engine = SyncEngine::new(storage.clone(), source, settings.sync.clone());
        let query = QueryService::new(storage);
        let search = SmartSearch::new(query.clone(), narrator, settings.narrative.timeout);
        Self {
            engine,
            query,
            search,
            settings,
        }
    }

    /// The config a request targets: the one named, else the default
    /// (bootstrapped from settings when none exists).
    fn resolve_config(&self, requested: Option<i64>) -> Result<i64> {
        if let Some(id) = requested {
            return Ok(id);
        }
        sync::default_config(self.engine.storage(), &self.settings.remote)?
            .map(|config| config.id)
            .ok_or_else(|| {
                Error::Validation(
                    "no sync config exists; create one with POST /api/sync or set EPICSYNC_EPIC_ID"
                        .into(),
                )
            })
    }
}

/// Build the router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/sync",
            get(configs::list_configs).post(configs::create_config),
        )
        .route("/api/sync/remote-info", get(configs::remote_info))
        .route(
            "/api/sync/:id",
            get(configs::get_config).delete(configs::delete_config),
        )
        .route("/api/sync/:id/execute", post(configs::execute))
        .route("/api/sync/:id/runs", get(configs::runs))
        .route("/api/workitems", get(workitems::list))
        .route("/api/workitems/metadata", get(workitems::metadata))
        .route("/api/workitems/counts", get(workitems::counts))
        .route("/api/workitems/smart-search", post(workitems::smart_search))
        .route("/api/workitems/:id", get(workitems::get_item))
        .route("/api/workitems/:id/children", get(workitems::children))
        .route("/api/workitems/:id/comments", get(workitems::comments))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C. Shutdown cancels in-flight sync runs, which commit
/// nothing unless already past their apply step.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr, sync_on_start: bool) -> Result<()> {
    let shutdown = state.engine.cancellation_token();
    if sync_on_start {
        spawn_startup_sync(Arc::clone(&state));
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        () = ctrl_c => info!("Shutdown requested"),
        () = token.cancelled() => {}
    }
    token.cancel();
}

/// Sync every config once in the background, bootstrapping the default
/// config first if none exists.
fn spawn_startup_sync(state: Arc<AppState>) {
    tokio::spawn(async move {
        if let Err(e) = sync::default_config(state.engine.storage(), &state.settings.remote) {
            warn!(error = %e, "Startup sync skipped");
            return;
        }
        let configs = storage::lock(state.engine.storage()).list_sync_configs();
        let configs = match configs {
            Ok(configs) if configs.is_empty() => {
                warn!("Startup sync skipped: no sync config and EPICSYNC_EPIC_ID is not set");
                return;
            }
            Ok(configs) => configs,
            Err(e) => {
                warn!(error = %e, "Startup sync skipped");
                return;
            }
        };
        for config in configs {
            if let Err(e) = state.engine.execute(config.id).await {
                warn!(config_id = config.id, error = %e, "Startup sync failed");
            }
        }
    });
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}

// ── Errors and extractors ─────────────────────────────────────

/// [`Error`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(code = self.0.error_code().as_str(), error = %self.0, "Request failed");
        } else {
            debug!(code = self.0.error_code().as_str(), error = %self.0, "Request rejected");
        }
        (status, Json(self.0.to_api_body())).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// `syncConfigId` query parameter shared by the item routes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigParam {
    sync_config_id: Option<i64>,
}

fn path_id(path: std::result::Result<Path<i64>, PathRejection>) -> ApiResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|e| Error::Validation(format!("invalid id: {}", e.body_text())).into())
}

fn query_param<T>(query: std::result::Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(value)| value)
        .map_err(|e| Error::Validation(e.body_text()).into())
}
