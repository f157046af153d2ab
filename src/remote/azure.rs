//! Azure DevOps REST adapter.
//!
//! Descendants come from one recursive WIQL link query; payloads are fetched
//! in batches of at most [`MAX_BATCH_SIZE`] ids; comments are paged with
//! `continuationToken`. Every request runs under the configured
//! [`RetryPolicy`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::retry::{with_retry, RetryPolicy};
use super::types::{
    CommentListResponse, LinkDto, WiqlRequest, WiqlResponse, WorkItemBatchResponse, CHILD_LINK,
};
use super::{CommentPayload, ItemPayload, RemoteScope, RemoteSource};
use crate::config::{RemoteSettings, MAX_BATCH_SIZE};
use crate::error::{Error, Result};

/// Comments requested per page.
const COMMENT_PAGE_SIZE: u32 = 200;

/// Most work items or links one WIQL query may return. The endpoint has no
/// continuation; larger results are rejected with `VS402337`.
const WIQL_RESULT_LIMIT: usize = 20_000;

/// Azure DevOps work item tracking client.
#[derive(Debug, Clone)]
pub struct AzureDevOpsClient {
    client: reqwest::Client,
    base_url: String,
    pat: Option<String>,
    api_version: String,
    retry: RetryPolicy,
    batch_size: usize,
}

impl AzureDevOpsClient {
    /// Build a client from resolved settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(settings: &RemoteSettings, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("epicsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            pat: settings.pat.clone(),
            api_version: settings.api_version.clone(),
            retry,
            batch_size: MAX_BATCH_SIZE,
        })
    }

    /// Cap ids per batch request. Clamped to `1..=MAX_BATCH_SIZE`.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    /// `{base}/{org}/{project}/_apis/{segments...}?api-version=...`
    fn api_url(&self, scope: &RemoteScope, segments: &[&str], api_version: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            Error::Config(format!("Invalid Azure DevOps base URL '{}': {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("Base URL '{}' cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .push(&scope.organization)
            .push(&scope.project)
            .push("_apis")
            .extend(segments);
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.pat {
            Some(pat) => request.basic_auth("", Some(pat)),
            None => request,
        }
    }

    /// Send with retry and decode a JSON body.
    async fn send_json<T, B>(&self, what: &str, build: B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let build = &build;
        with_retry(&self.retry, what, move || async move {
            let response = self
                .authorize(build(&self.client))
                .send()
                .await
                .map_err(transport_error)?;
            let response = check_status(response).await?;
            Ok(response.json::<T>().await?)
        })
        .await
    }

    /// Confirm the root exists before walking its links.
    async fn check_root_exists(&self, scope: &RemoteScope, root_id: i64) -> Result<()> {
        let id = root_id.to_string();
        let url = self.api_url(scope, &["wit", "workitems", id.as_str()], &self.api_version)?;

        match self
            .send_json::<serde_json::Value, _>("root lookup", |c| c.get(url.clone()))
            .await
        {
            Ok(_) => Ok(()),
            Err(Error::Remote { status: 404, .. }) => Err(Error::RootNotFound { root_id }),
            Err(e) => Err(e),
        }
    }
}

impl RemoteSource for AzureDevOpsClient {
    fn name(&self) -> &'static str {
        "azure-devops"
    }

    async fn fetch_descendant_ids(&self, scope: &RemoteScope, root_id: i64) -> Result<Vec<i64>> {
        self.check_root_exists(scope, root_id).await?;

        let url = self.api_url(scope, &["wit", "wiql"], &self.api_version)?;
        let query = format!(
            "SELECT [System.Id] FROM WorkItemLinks \
             WHERE ([Source].[System.Id] = {root_id}) \
             AND ([System.Links.LinkType] = '{CHILD_LINK}') \
             MODE (Recursive)"
        );
        let body = WiqlRequest { query: &query };

        let response: WiqlResponse = match self
            .send_json("descendant query", |c| c.post(url.clone()).json(&body))
            .await
        {
            Ok(response) => response,
            Err(Error::Remote { status, message }) if exceeds_wiql_limit(&message) => {
                return Err(Error::Remote {
                    status,
                    message: format!(
                        "Epic {root_id} has more than {WIQL_RESULT_LIMIT} linked descendants, the most \
                         one WIQL query can return; sync its child Features as separate configs \
                         ({message})"
                    ),
                });
            }
            Err(e) => return Err(e),
        };
        if response.work_item_relations.len() >= WIQL_RESULT_LIMIT {
            warn!(
                root_id,
                links = response.work_item_relations.len(),
                "Descendant query hit the WIQL result limit; the tree may be truncated"
            );
        }

        let ids = walk_descendants(root_id, &response.work_item_relations);
        debug!(root_id, count = ids.len(), "Resolved descendant ids");
        Ok(ids)
    }

    async fn fetch_item_payloads(
        &self,
        scope: &RemoteScope,
        ids: &[i64],
    ) -> Result<Vec<ItemPayload>> {
        let mut payloads = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(self.batch_size) {
            let joined = chunk
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let mut url = self.api_url(scope, &["wit", "workitems"], &self.api_version)?;
            url.query_pairs_mut()
                .append_pair("ids", &joined)
                .append_pair("$expand", "relations")
                .append_pair("errorPolicy", "omit");

            let batch: WorkItemBatchResponse = self
                .send_json("work item batch", |c| c.get(url.clone()))
                .await?;

            let before = payloads.len();
            payloads.extend(batch.value.into_iter().flatten().map(ItemPayload::from));
            let omitted = chunk.len().saturating_sub(payloads.len() - before);
            if omitted > 0 {
                warn!(omitted, "Work items vanished between id and payload fetch");
            }
        }

        Ok(payloads)
    }

    async fn fetch_comments(
        &self,
        scope: &RemoteScope,
        item_id: i64,
        since_version: i64,
    ) -> Result<Vec<CommentPayload>> {
        let id = item_id.to_string();
        let version = format!("{}-preview.4", self.api_version);
        let mut comments = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut url = self.api_url(scope, &["wit", "workItems", id.as_str(), "comments"], &version)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("$top", &COMMENT_PAGE_SIZE.to_string());
                if let Some(token) = &continuation {
                    query.append_pair("continuationToken", token);
                }
            }

            let page: CommentListResponse = self
                .send_json("comment page", |c| c.get(url.clone()))
                .await?;

            comments.extend(
                page.comments
                    .into_iter()
                    .map(CommentPayload::from)
                    .filter(|c| c.version > since_version),
            );

            match page.continuation_token.filter(|t| !t.is_empty()) {
                Some(token) if continuation.as_deref() != Some(token.as_str()) => {
                    continuation = Some(token);
                }
                _ => break,
            }
        }

        Ok(comments)
    }
}

/// Breadth-first walk of the child links from `root_id`, root first.
///
/// Builds an id -> children index once; the visited set makes the result
/// duplicate-free even if the remote graph has cycles.
fn walk_descendants(root_id: i64, links: &[LinkDto]) -> Vec<i64> {
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    for link in links {
        let Some(source) = link.source else { continue };
        if link.rel.as_deref().is_some_and(|rel| rel != CHILD_LINK) {
            continue;
        }
        children.entry(source.id).or_default().push(link.target.id);
    }

    let mut visited = HashSet::from([root_id]);
    let mut order = vec![root_id];
    let mut queue = VecDeque::from([root_id]);
    while let Some(id) = queue.pop_front() {
        for &child in children.get(&id).map_or(&[][..], Vec::as_slice) {
            if visited.insert(child) {
                order.push(child);
                queue.push_back(child);
            }
        }
    }
    order
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() || e.is_connect() {
        Error::TransientRemote {
            message: e.to_string(),
            retry_after: None,
        }
    } else {
        Error::Http(e)
    }
}

/// Map a non-success response onto the error taxonomy.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = parse_retry_after(response.headers().get(RETRY_AFTER));
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, retry_after, &body))
}

fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> Error {
    let detail = summarize_body(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::RemoteAuth(format!(
            "Azure DevOps rejected the credentials ({status}){detail}"
        )),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => Error::TransientRemote {
            message: format!("Azure DevOps throttled the request ({status}){detail}"),
            retry_after,
        },
        s if s.is_server_error() => Error::TransientRemote {
            message: format!("Azure DevOps server error ({status}){detail}"),
            retry_after,
        },
        s => Error::Remote {
            status: s.as_u16(),
            message: format!("Azure DevOps request failed ({status}){detail}"),
        },
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    value?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn exceeds_wiql_limit(message: &str) -> bool {
    message.contains("VS402337") || message.contains("exceeds the size limit")
}

fn summarize_body(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return String::new();
    }
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect());
    format!(": {message}")
}
