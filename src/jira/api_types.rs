//! Serde-deserializable types matching Jira API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on resolution needs.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::dates::parse_jira_datetime;

use super::types::{FieldMeta, IssuePayload, Sprint, SprintPage, SprintRef, SprintState};

// ============================================================================
// Sprints - agile API and issue sprint fields
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiSprint {
  pub id: u64,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub state: Option<String>,
  #[serde(rename = "startDate", default)]
  pub start_date: Option<String>,
  #[serde(rename = "endDate", default)]
  pub end_date: Option<String>,
  #[serde(rename = "completeDate", default)]
  pub complete_date: Option<String>,
  // The agile API says originBoardId, issue sprint fields say boardId
  #[serde(rename = "originBoardId", alias = "boardId", default)]
  pub origin_board_id: Option<u64>,
  #[serde(default)]
  pub goal: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiSprintPage {
  #[serde(default)]
  pub values: Vec<ApiSprint>,
  #[serde(rename = "startAt", default)]
  pub start_at: u64,
  #[serde(rename = "maxResults", default)]
  pub max_results: u64,
  #[serde(rename = "isLast", default)]
  pub is_last: bool,
}

// ============================================================================
// Fields - catalog and edit metadata
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiFieldSchema {
  #[serde(default)]
  pub custom: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiField {
  pub id: String,
  #[serde(default)]
  pub name: String,
  pub schema: Option<ApiFieldSchema>,
}

#[derive(Debug, Deserialize)]
pub struct ApiEditField {
  #[serde(default)]
  pub name: String,
  pub schema: Option<ApiFieldSchema>,
}

#[derive(Debug, Deserialize)]
pub struct ApiEditMeta {
  #[serde(default)]
  pub fields: HashMap<String, ApiEditField>,
}

// ============================================================================
// Issues
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiIssue {
  pub key: String,
  #[serde(default)]
  pub fields: HashMap<String, Value>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl From<ApiSprint> for Sprint {
  fn from(s: ApiSprint) -> Self {
    Sprint {
      id: s.id,
      name: s.name.unwrap_or_default(),
      state: s
        .state
        .as_deref()
        .map(SprintState::parse)
        .unwrap_or(SprintState::Unknown),
      start_date: s.start_date.as_deref().and_then(parse_jira_datetime),
      end_date: s.end_date.as_deref().and_then(parse_jira_datetime),
      complete_date: s.complete_date.as_deref().and_then(parse_jira_datetime),
      board_id: s.origin_board_id,
      goal: s.goal.filter(|g| !g.is_empty()),
    }
  }
}

impl ApiSprintPage {
  /// Convert to a domain page. `requested_start` is used when the response
  /// omits `startAt`.
  pub fn into_page(self, requested_start: u64) -> SprintPage {
    let start_at = if self.start_at == 0 {
      requested_start
    } else {
      self.start_at
    };
    let count = self.values.len() as u64;
    let next_start_at = if self.is_last || count == 0 {
      None
    } else {
      Some(start_at + count)
    };

    SprintPage {
      sprints: self.values.into_iter().map(Sprint::from).collect(),
      start_at,
      next_start_at,
    }
  }
}

impl From<ApiField> for FieldMeta {
  fn from(f: ApiField) -> Self {
    FieldMeta {
      id: f.id,
      name: f.name,
      custom_type: f.schema.and_then(|s| s.custom),
    }
  }
}

impl ApiEditMeta {
  pub fn into_fields(self) -> Vec<FieldMeta> {
    let mut fields: Vec<FieldMeta> = self
      .fields
      .into_iter()
      .map(|(id, f)| FieldMeta {
        id,
        name: f.name,
        custom_type: f.schema.and_then(|s| s.custom),
      })
      .collect();
    // HashMap order is random; keep discovery deterministic
    fields.sort_by(|a, b| a.id.cmp(&b.id));
    fields
  }
}

impl From<ApiIssue> for IssuePayload {
  fn from(issue: ApiIssue) -> Self {
    IssuePayload {
      key: issue.key,
      fields: issue.fields,
    }
  }
}

// ============================================================================
// Helpers
// ============================================================================

/// Extract sprint membership entries from an issue's sprint field.
///
/// The field can be:
/// - an array of sprint objects (Cloud, recent Server)
/// - an array of encoded strings like `...Sprint@1f2e[id=42,rapidViewId=3,...]`
/// - a single object or string
/// - null
pub fn sprint_refs(value: &Value) -> Vec<SprintRef> {
  match value {
    Value::Array(items) => items.iter().filter_map(sprint_ref).collect(),
    Value::Null => Vec::new(),
    other => sprint_ref(other).into_iter().collect(),
  }
}

fn sprint_ref(value: &Value) -> Option<SprintRef> {
  match value {
    Value::Object(_) => match serde_json::from_value::<ApiSprint>(value.clone()) {
      Ok(sprint) => Some(SprintRef::Inline(sprint.into())),
      Err(e) => {
        warn!("Skipping unparseable sprint entry: {}", e);
        None
      }
    },
    Value::String(s) => extract_sprint_id(s).map(SprintRef::Id),
    _ => None,
  }
}

/// Pull `id=<digits>` out of a legacy encoded sprint string
fn extract_sprint_id(encoded: &str) -> Option<u64> {
  encoded
    .split(|c: char| c == '[' || c == ',' || c == ']')
    .filter_map(|part| part.trim().strip_prefix("id="))
    .find_map(|digits| digits.parse().ok())
}
