//! Layered runtime settings.
//!
//! The JSON config file is parsed into [`ConfigFile`], whose sections are all
//! optional. [`Settings::from_sources`] then overlays environment variables
//! and fills in defaults.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::DeletionPolicy;
use crate::remote::retry::RetryPolicy;

/// Upper bound on ids per batch request accepted by the remote API.
pub const MAX_BATCH_SIZE: usize = 200;

const DEFAULT_AZURE_BASE_URL: &str = "https://dev.azure.com";
const DEFAULT_API_VERSION: &str = "7.1";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_NARRATIVE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_CONCURRENCY: usize = 4;
const DEFAULT_COMMENT_REFRESH_INTERVAL: u64 = 10;

// ── Config file ─────────────────────────────────────────────

/// On-disk shape of `~/.epicsync/config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigFile {
    pub azure_dev_ops: AzureSection,
    pub openai: OpenAiSection,
    pub sync: SyncSection,
    pub server: ServerSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AzureSection {
    pub base_url: Option<String>,
    pub pat: Option<String>,
    pub api_version: Option<String>,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub epic_id: Option<i64>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenAiSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSection {
    pub batch_size: Option<usize>,
    pub max_concurrency: Option<usize>,
    pub max_retries: Option<u32>,
    pub deletion_policy: Option<String>,
    pub comment_refresh_interval: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSection {
    pub bind: Option<String>,
    pub sync_on_start: Option<bool>,
}

// ── Resolved settings ───────────────────────────────────────

/// Remote tracker coordinates and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub base_url: String,
    pub pat: Option<String>,
    pub api_version: String,
    /// Defaults used when bootstrapping a sync config.
    pub organization: Option<String>,
    pub project: Option<String>,
    pub epic_id: Option<i64>,
    pub request_timeout: Duration,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AZURE_BASE_URL.to_string(),
            pat: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            organization: None,
            project: None,
            epic_id: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Narrative collaborator endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for NarrativeSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_NARRATIVE_TIMEOUT_SECS),
        }
    }
}

/// Reconciliation tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    pub deletion_policy: DeletionPolicy,
    /// Every Nth completed run refreshes all comments. 0 disables.
    pub comment_refresh_interval: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry: RetryPolicy::default(),
            deletion_policy: DeletionPolicy::default(),
            comment_refresh_interval: DEFAULT_COMMENT_REFRESH_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind: Option<String>,
    pub sync_on_start: bool,
}

/// Fully resolved settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub remote: RemoteSettings,
    pub narrative: NarrativeSettings,
    pub sync: SyncSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Overlay environment values on a parsed config file.
    ///
    /// `env` looks up a variable by name; blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a value cannot be parsed or is out of range.
    pub fn from_sources<E>(file: ConfigFile, env: E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let remote = RemoteSettings {
            base_url: env("AZURE_DEVOPS_BASE_URL")
                .or(file.azure_dev_ops.base_url)
                .map_or(defaults.remote.base_url, |url| {
                    url.trim_end_matches('/').to_string()
                }),
            pat: env("AZURE_DEVOPS_PAT").or(file.azure_dev_ops.pat),
            api_version: env("AZURE_DEVOPS_API_VERSION")
                .or(file.azure_dev_ops.api_version)
                .unwrap_or(defaults.remote.api_version),
            organization: env("AZURE_DEVOPS_ORGANIZATION").or(file.azure_dev_ops.organization),
            project: env("AZURE_DEVOPS_PROJECT").or(file.azure_dev_ops.project),
            epic_id: parse_var(&env, "EPICSYNC_EPIC_ID")?.or(file.azure_dev_ops.epic_id),
            request_timeout: parse_var(&env, "AZURE_DEVOPS_TIMEOUT_SECS")?
                .or(file.azure_dev_ops.request_timeout_secs)
                .map_or(defaults.remote.request_timeout, Duration::from_secs),
        };

        let narrative = NarrativeSettings {
            base_url: env("OPENAI_BASE_URL")
                .or(file.openai.base_url)
                .map_or(defaults.narrative.base_url, |url| {
                    url.trim_end_matches('/').to_string()
                }),
            api_key: env("OPENAI_API_KEY").or(file.openai.api_key),
            model: env("OPENAI_MODEL")
                .or(file.openai.model)
                .unwrap_or(defaults.narrative.model),
            timeout: parse_var(&env, "EPICSYNC_NARRATIVE_TIMEOUT_SECS")?
                .or(file.openai.timeout_secs)
                .map_or(defaults.narrative.timeout, Duration::from_secs),
        };

        let batch_size = parse_var(&env, "EPICSYNC_BATCH_SIZE")?
            .or(file.sync.batch_size)
            .unwrap_or(defaults.sync.batch_size);
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(Error::Config(format!(
                "batch size must be between 1 and {MAX_BATCH_SIZE}, got {batch_size}"
            )));
        }

        let max_concurrency = parse_var(&env, "EPICSYNC_MAX_CONCURRENCY")?
            .or(file.sync.max_concurrency)
            .unwrap_or(defaults.sync.max_concurrency);
        if max_concurrency == 0 {
            return Err(Error::Config("max concurrency must be at least 1".into()));
        }

        let mut retry = defaults.sync.retry;
        if let Some(max) = parse_var::<u32, _>(&env, "EPICSYNC_MAX_RETRIES")?.or(file.sync.max_retries)
        {
            retry.max_attempts = max.max(1);
        }

        let deletion_policy = match env("EPICSYNC_DELETION_POLICY").or(file.sync.deletion_policy) {
            Some(raw) => DeletionPolicy::parse(&raw)?,
            None => defaults.sync.deletion_policy,
        };

        let sync = SyncSettings {
            batch_size,
            max_concurrency,
            retry,
            deletion_policy,
            comment_refresh_interval: parse_var(&env, "EPICSYNC_COMMENT_REFRESH_INTERVAL")?
                .or(file.sync.comment_refresh_interval)
                .unwrap_or(defaults.sync.comment_refresh_interval),
        };

        let server = ServerSettings {
            bind: file.server.bind,
            sync_on_start: file.server.sync_on_start.unwrap_or(false),
        };

        Ok(Self {
            remote,
            narrative,
            sync,
            server,
        })
    }
}

fn parse_var<T, E>(env: &E, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    E: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Invalid value for {key} ('{raw}'): {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let s = Settings::from_sources(ConfigFile::default(), env_of(&[])).unwrap();
        assert_eq!(s.remote.base_url, "https://dev.azure.com");
        assert_eq!(s.remote.api_version, "7.1");
        assert_eq!(s.narrative.model, "gpt-4o-mini");
        assert_eq!(s.narrative.timeout, Duration::from_secs(30));
        assert_eq!(s.sync.batch_size, 200);
        assert_eq!(s.sync.max_concurrency, 4);
        assert_eq!(s.sync.retry.max_attempts, 5);
        assert_eq!(s.sync.deletion_policy, DeletionPolicy::Hard);
        assert_eq!(s.sync.comment_refresh_interval, 10);
    }

    #[test]
    fn test_env_overrides_file() {
        let file: ConfigFile = serde_json::from_str(
            r#"{
                "azureDevOps": {"organization": "file-org", "project": "Alpha", "baseUrl": "https://ado.local/"},
                "openai": {"model": "file-model"},
                "sync": {"batchSize": 50, "deletionPolicy": "hard"}
            }"#,
        )
        .unwrap();
        let s = Settings::from_sources(
            file,
            env_of(&[
                ("AZURE_DEVOPS_ORGANIZATION", "env-org"),
                ("EPICSYNC_DELETION_POLICY", "tombstone"),
                ("OPENAI_MODEL", "  "),
            ]),
        )
        .unwrap();
        assert_eq!(s.remote.organization.as_deref(), Some("env-org"));
        assert_eq!(s.remote.project.as_deref(), Some("Alpha"));
        assert_eq!(s.remote.base_url, "https://ado.local");
        assert_eq!(s.narrative.model, "file-model");
        assert_eq!(s.sync.batch_size, 50);
        assert_eq!(s.sync.deletion_policy, DeletionPolicy::Tombstone);
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad = |pairs: &[(&str, &str)]| {
            Settings::from_sources(ConfigFile::default(), env_of(pairs)).unwrap_err()
        };
        assert!(matches!(bad(&[("EPICSYNC_BATCH_SIZE", "500")]), Error::Config(_)));
        assert!(matches!(bad(&[("EPICSYNC_BATCH_SIZE", "0")]), Error::Config(_)));
        assert!(matches!(bad(&[("EPICSYNC_MAX_CONCURRENCY", "0")]), Error::Config(_)));
        assert!(matches!(bad(&[("EPICSYNC_EPIC_ID", "abc")]), Error::Config(_)));
        assert!(matches!(bad(&[("EPICSYNC_DELETION_POLICY", "maybe")]), Error::Config(_)));
    }
}
