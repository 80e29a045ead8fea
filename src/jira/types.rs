use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Sprint lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SprintState {
  Active,
  Closed,
  Future,
  Unknown,
}

impl SprintState {
  pub fn parse(value: &str) -> Self {
    match value.trim().to_ascii_lowercase().as_str() {
      "active" => SprintState::Active,
      "closed" => SprintState::Closed,
      "future" => SprintState::Future,
      _ => SprintState::Unknown,
    }
  }
}

/// A sprint as reported by the agile API.
///
/// Built once from upstream data and never patched afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sprint {
  pub id: u64,
  pub name: String,
  pub state: SprintState,
  pub start_date: Option<DateTime<FixedOffset>>,
  pub end_date: Option<DateTime<FixedOffset>>,
  pub complete_date: Option<DateTime<FixedOffset>>,
  pub board_id: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub goal: Option<String>,
}

impl Sprint {
  /// Calendar day the sprint starts on, in the sprint's own offset
  pub fn start_day(&self) -> Option<NaiveDate> {
    self.start_date.map(|d| d.date_naive())
  }

  /// Calendar day the sprint ends on, in the sprint's own offset
  pub fn end_day(&self) -> Option<NaiveDate> {
    self.end_date.map(|d| d.date_naive())
  }

  /// Whether `date` falls inside `[start, end]`.
  /// A missing start is open-started, a missing end is open-ended.
  pub fn contains_date(&self, date: NaiveDate) -> bool {
    self.start_day().map_or(true, |start| start <= date)
      && self.end_day().map_or(true, |end| date <= end)
  }

  /// Whether the sprint window intersects `[start, end]`
  pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
    self.start_day().map_or(true, |s| s <= end) && self.end_day().map_or(true, |e| e >= start)
  }
}

/// State filter for board sprint listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StateFilter {
  #[default]
  All,
  Active,
  Future,
  Closed,
}

impl StateFilter {
  /// Value for the `state` query parameter; `None` means no filtering
  pub fn as_param(&self) -> Option<&'static str> {
    match self {
      StateFilter::All => None,
      StateFilter::Active => Some("active"),
      StateFilter::Future => Some("future"),
      StateFilter::Closed => Some("closed"),
    }
  }

  pub fn as_str(&self) -> &'static str {
    self.as_param().unwrap_or("all")
  }
}

/// One page of a board's sprint listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SprintPage {
  pub sprints: Vec<Sprint>,
  pub start_at: u64,
  /// Offset of the following page, `None` on the last page
  pub next_start_at: Option<u64>,
}

/// Id of the custom field carrying sprint membership (e.g. "customfield_10020")
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldId(pub String);

impl FieldId {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for FieldId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

/// Field metadata from the field catalog or an issue's edit metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
  pub id: String,
  pub name: String,
  /// Schema `custom` type, present on custom fields only
  pub custom_type: Option<String>,
}

/// Raw issue fields, keyed by field id
#[derive(Debug, Clone, PartialEq)]
pub struct IssuePayload {
  pub key: String,
  pub fields: HashMap<String, serde_json::Value>,
}

/// Sprint membership entry found on an issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SprintRef {
  /// Full sprint object embedded in the issue payload
  Inline(Sprint),
  /// Legacy encoded reference; only the id is trusted
  Id(u64),
}
