//! Error types for epicsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes for the CLI and HTTP statuses for the API
//! - Retryability flags (transient remote failures, conflicts, timeouts)
//! - Context-aware recovery hints
//! - The uniform `{ "error": string }` body used by every HTTP route

use std::time::Duration;
use thiserror::Error;

/// Result type alias for epicsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Remote (exit 2)
    TransientRemote,
    RemoteAuth,
    RootNotFound,
    RemoteError,

    // Not Found (exit 3)
    SyncConfigNotFound,
    WorkItemNotFound,

    // Validation (exit 4)
    Validation,

    // Sync (exit 5)
    SyncConflict,
    Cancelled,

    // Narrative (exit 6)
    NarrativeTimeout,
    NarrativeError,

    // Config (exit 7)
    ConfigError,

    // Storage / I/O (exit 8)
    DatabaseError,
    HttpError,
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::TransientRemote => "TRANSIENT_REMOTE_ERROR",
            Self::RemoteAuth => "REMOTE_AUTH_ERROR",
            Self::RootNotFound => "ROOT_NOT_FOUND",
            Self::RemoteError => "REMOTE_ERROR",
            Self::SyncConfigNotFound => "SYNC_CONFIG_NOT_FOUND",
            Self::WorkItemNotFound => "WORK_ITEM_NOT_FOUND",
            Self::Validation => "VALIDATION_ERROR",
            Self::SyncConflict => "SYNC_CONFLICT",
            Self::Cancelled => "CANCELLED",
            Self::NarrativeTimeout => "NARRATIVE_TIMEOUT",
            Self::NarrativeError => "NARRATIVE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::HttpError => "HTTP_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::TransientRemote | Self::RemoteAuth | Self::RootNotFound | Self::RemoteError => 2,
            Self::SyncConfigNotFound | Self::WorkItemNotFound => 3,
            Self::Validation => 4,
            Self::SyncConflict | Self::Cancelled => 5,
            Self::NarrativeTimeout | Self::NarrativeError => 6,
            Self::ConfigError => 7,
            Self::DatabaseError | Self::HttpError | Self::IoError | Self::JsonError => 8,
        }
    }

    /// HTTP status code reported by the API for this category.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::RootNotFound | Self::SyncConfigNotFound | Self::WorkItemNotFound => 404,
            Self::SyncConflict => 409,
            Self::RemoteAuth | Self::RemoteError | Self::NarrativeError => 502,
            Self::TransientRemote | Self::Cancelled => 503,
            Self::NarrativeTimeout => 504,
            Self::ConfigError
            | Self::DatabaseError
            | Self::HttpError
            | Self::IoError
            | Self::JsonError
            | Self::InternalError => 500,
        }
    }

    /// Whether the same request may succeed if simply repeated later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientRemote | Self::SyncConflict | Self::NarrativeTimeout | Self::Cancelled
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in epicsync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Timeouts, 5xx and rate-limit responses. Retried by the adapter and
    /// only surfaced once the attempt ceiling is reached.
    #[error("Transient remote error: {message}")]
    TransientRemote {
        message: String,
        /// Server-provided `Retry-After` hint, if any.
        retry_after: Option<Duration>,
    },

    #[error("Remote authentication failed: {0}")]
    RemoteAuth(String),

    #[error("Root work item not found: {root_id}")]
    RootNotFound { root_id: i64 },

    #[error("Remote request failed ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Sync config not found: {id}")]
    SyncConfigNotFound { id: i64 },

    #[error("Work item not found: {id}")]
    WorkItemNotFound { id: i64 },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("A sync is already running for config {sync_config_id}")]
    SyncConflict { sync_config_id: i64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Narrative generation timed out after {}s", .0.as_secs())]
    NarrativeTimeout(Duration),

    #[error("Narrative generation failed: {0}")]
    Narrative(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::TransientRemote { .. } => ErrorCode::TransientRemote,
            Self::RemoteAuth(_) => ErrorCode::RemoteAuth,
            Self::RootNotFound { .. } => ErrorCode::RootNotFound,
            Self::Remote { .. } => ErrorCode::RemoteError,
            Self::SyncConfigNotFound { .. } => ErrorCode::SyncConfigNotFound,
            Self::WorkItemNotFound { .. } => ErrorCode::WorkItemNotFound,
            Self::Validation(_) => ErrorCode::Validation,
            Self::SyncConflict { .. } => ErrorCode::SyncConflict,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::NarrativeTimeout(_) => ErrorCode::NarrativeTimeout,
            Self::Narrative(_) => ErrorCode::NarrativeError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Http(_) => ErrorCode::HttpError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// HTTP status for the API layer, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.error_code().http_status()
    }

    /// True for failures the remote adapter retries with backoff.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientRemote { .. })
    }

    /// Context-aware recovery hint for humans.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::RemoteAuth(_) => Some(
                "Check AZURE_DEVOPS_PAT: the token must be valid and have Work Items (Read) scope."
                    .to_string(),
            ),
            Self::RootNotFound { root_id } => Some(format!(
                "Epic #{root_id} does not exist in the configured project. \
                 Recreate the sync config with a valid epic id."
            )),
            Self::SyncConfigNotFound { id } => Some(format!(
                "No sync config with ID {id}. Use `epicsync config list` to see available configs."
            )),
            Self::SyncConflict { .. } => {
                Some("Wait for the running sync to finish, then try again.".to_string())
            }
            Self::TransientRemote { .. } => Some(
                "The remote tracker is unavailable or rate limiting; retry in a moment.".to_string(),
            ),
            Self::NarrativeTimeout(_) => Some(
                "Raise EPICSYNC_NARRATIVE_TIMEOUT_SECS or rephrase the query as a filter."
                    .to_string(),
            ),
            Self::Validation(msg) if msg.contains("sort field") => Some(format!(
                "Valid sort columns: {}",
                crate::model::SORT_COLUMNS.join(", ")
            )),
            _ => None,
        }
    }

    /// Structured JSON representation for `--json` CLI output.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }

    /// The uniform `{ "error": string }` body returned by every HTTP route.
    #[must_use]
    pub fn to_api_body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_http_statuses() {
        assert_eq!(Error::Validation("bad".into()).http_status(), 400);
        assert_eq!(Error::SyncConflict { sync_config_id: 1 }.http_status(), 409);
        assert_eq!(Error::RootNotFound { root_id: 7 }.http_status(), 404);
        assert_eq!(Error::RemoteAuth("401".into()).http_status(), 502);
        assert_eq!(
            Error::NarrativeTimeout(Duration::from_secs(3)).http_status(),
            504
        );
        let transient = Error::TransientRemote {
            message: "503".into(),
            retry_after: None,
        };
        assert_eq!(transient.http_status(), 503);
    }

    #[test]
    fn test_only_transient_is_retried_by_adapter() {
        let transient = Error::TransientRemote {
            message: "timeout".into(),
            retry_after: Some(Duration::from_secs(1)),
        };
        assert!(transient.is_transient());
        assert!(!Error::RemoteAuth("403".into()).is_transient());
        assert!(!Error::RootNotFound { root_id: 1 }.is_transient());
    }

    #[test]
    fn test_api_body_shape() {
        let body = Error::SyncConflict { sync_config_id: 4 }.to_api_body();
        let obj = body.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj["error"].as_str().unwrap().contains("config 4"));
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let json = Error::SyncConfigNotFound { id: 9 }.to_structured_json();
        assert_eq!(json["error"]["code"], "SYNC_CONFIG_NOT_FOUND");
        assert_eq!(json["error"]["exit_code"], 3);
        assert!(json["error"]["hint"].as_str().unwrap().contains("config list"));
    }
}
