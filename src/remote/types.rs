//! Azure DevOps wire types.
//!
//! Only the fields the mirror needs are modelled; everything else in the
//! REST responses is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{CommentPayload, ItemPayload};

/// Relation type pointing from a child to its parent.
pub const PARENT_LINK: &str = "System.LinkTypes.Hierarchy-Reverse";
/// Relation type pointing from a parent to its children.
pub const CHILD_LINK: &str = "System.LinkTypes.Hierarchy-Forward";

/// `GET _apis/wit/workitems?ids=...` response.
///
/// With `errorPolicy=omit`, ids that no longer exist come back as `null`.
#[derive(Debug, Deserialize)]
pub struct WorkItemBatchResponse {
    #[serde(default)]
    pub value: Vec<Option<WorkItemDto>>,
}

#[derive(Debug, Deserialize)]
pub struct WorkItemDto {
    pub id: i64,
    pub rev: i64,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub relations: Vec<RelationDto>,
}

#[derive(Debug, Deserialize)]
pub struct RelationDto {
    pub rel: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// `POST _apis/wit/wiql` request body.
#[derive(Debug, Serialize)]
pub struct WiqlRequest<'a> {
    pub query: &'a str,
}

/// Link-query WIQL response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WiqlResponse {
    #[serde(default)]
    pub work_items: Vec<WorkItemRef>,
    #[serde(default)]
    pub work_item_relations: Vec<LinkDto>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WorkItemRef {
    pub id: i64,
}

/// One edge of a link query. `source` is null for the top-level row.
#[derive(Debug, Deserialize)]
pub struct LinkDto {
    #[serde(default)]
    pub source: Option<WorkItemRef>,
    pub target: WorkItemRef,
    #[serde(default)]
    pub rel: Option<String>,
}

/// `GET _apis/wit/workItems/{id}/comments` response page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListResponse {
    #[serde(default)]
    pub comments: Vec<CommentDto>,
    #[serde(default)]
    pub continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub id: i64,
    pub work_item_id: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub rendered_text: Option<String>,
    #[serde(default)]
    pub created_by: Option<IdentityDto>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub modified_by: Option<IdentityDto>,
    #[serde(default)]
    pub modified_date: Option<String>,
    pub version: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDto {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub unique_name: Option<String>,
}

impl IdentityDto {
    fn name(self) -> Option<String> {
        self.display_name.or(self.unique_name)
    }
}

impl From<WorkItemDto> for ItemPayload {
    fn from(dto: WorkItemDto) -> Self {
        let parent_id = dto
            .relations
            .iter()
            .find(|r| r.rel == PARENT_LINK)
            .and_then(|r| r.url.as_deref())
            .and_then(id_from_url);
        let f = &dto.fields;

        Self {
            id: dto.id,
            rev: dto.rev,
            title: string_field(f, "System.Title").unwrap_or_default(),
            work_item_type: string_field(f, "System.WorkItemType").unwrap_or_default(),
            state: string_field(f, "System.State").unwrap_or_default(),
            assigned_to: identity_field(f, "System.AssignedTo"),
            description: string_field(f, "System.Description"),
            priority: f.get("Microsoft.VSTS.Common.Priority").and_then(Value::as_i64),
            tags: string_field(f, "System.Tags"),
            area_path: string_field(f, "System.AreaPath"),
            iteration_path: string_field(f, "System.IterationPath"),
            parent_id,
            created_date: date_field(f, "System.CreatedDate"),
            changed_date: date_field(f, "System.ChangedDate"),
            created_by: identity_field(f, "System.CreatedBy"),
            changed_by: identity_field(f, "System.ChangedBy"),
        }
    }
}

impl From<CommentDto> for CommentPayload {
    fn from(dto: CommentDto) -> Self {
        let text = dto
            .rendered_text
            .filter(|t| !t.trim().is_empty())
            .or(dto.text)
            .unwrap_or_default();

        Self {
            id: dto.id,
            work_item_id: dto.work_item_id,
            text,
            created_by: dto.created_by.and_then(IdentityDto::name),
            created_date: dto.created_date.as_deref().and_then(parse_date),
            modified_by: dto.modified_by.and_then(IdentityDto::name),
            modified_date: dto.modified_date.as_deref().and_then(parse_date),
            version: dto.version,
        }
    }
}

/// Trailing numeric path segment of a work item URL.
#[must_use]
pub fn id_from_url(url: &str) -> Option<i64> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Identity fields are objects (`displayName`) on current API versions and
/// `"Name <email>"` strings on older ones.
fn identity_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::Object(obj) => obj
            .get("displayName")
            .or_else(|| obj.get("uniqueName"))
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::String(s) => {
            let name = s.split(" <").next().unwrap_or(s).trim();
            (!name.is_empty()).then(|| name.to_string())
        }
        _ => None,
    }
}

fn date_field(fields: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    fields.get(key).and_then(Value::as_str).and_then(parse_date)
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
