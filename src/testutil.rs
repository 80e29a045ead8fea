//! Test helpers: an in-memory `SprintSource` with scripted failures.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::Value;

use crate::jira::types::{
  FieldMeta, IssuePayload, Sprint, SprintPage, SprintState, StateFilter,
};
use crate::upstream::{Backoff, CallError, SprintSource, UpstreamAdapter};

/// Midnight UTC on `ymd` (`YYYY-MM-DD`)
pub fn day(ymd: &str) -> DateTime<FixedOffset> {
  NaiveDate::parse_from_str(ymd, "%Y-%m-%d")
    .unwrap()
    .and_hms_opt(0, 0, 0)
    .unwrap()
    .and_utc()
    .fixed_offset()
}

pub fn sprint(id: u64, name: &str) -> Sprint {
  Sprint {
    id,
    name: name.to_string(),
    state: SprintState::Closed,
    start_date: None,
    end_date: None,
    complete_date: None,
    board_id: None,
    goal: None,
  }
}

pub fn dated(
  id: u64,
  name: &str,
  start: Option<&str>,
  end: Option<&str>,
  complete: Option<&str>,
) -> Sprint {
  Sprint {
    start_date: start.map(day),
    end_date: end.map(day),
    complete_date: complete.map(day),
    ..sprint(id, name)
  }
}

pub fn fast_adapter(source: Arc<dyn SprintSource>, max_attempts: u32) -> UpstreamAdapter {
  UpstreamAdapter::new(
    source,
    Backoff::new(Duration::from_millis(1), Duration::from_millis(2), 0.0),
    max_attempts,
  )
}

/// Scripted upstream.
///
/// Calls are labelled `get_sprint:<id>`, `list_board_sprints:<board>:<start_at>`,
/// `get_issue:<key>`, `get_edit_meta:<key>` and `list_fields`; `fail_next`
/// queues errors for a label, returned before any real answer.
#[derive(Default)]
pub struct FakeSource {
  sprints: HashMap<u64, Sprint>,
  boards: HashMap<u64, Vec<Sprint>>,
  issues: HashMap<String, HashMap<String, Value>>,
  edit_meta: HashMap<String, Vec<FieldMeta>>,
  fields: Vec<FieldMeta>,
  latency: Duration,
  failures: Mutex<HashMap<String, VecDeque<CallError>>>,
  calls: Mutex<Vec<String>>,
}

impl FakeSource {
  pub fn with_sprint(mut self, sprint: Sprint) -> Self {
    self.sprints.insert(sprint.id, sprint);
    self
  }

  /// Board listing, paged by `max_results`
  pub fn with_board(mut self, board_id: u64, sprints: Vec<Sprint>) -> Self {
    self.boards.insert(board_id, sprints);
    self
  }

  pub fn with_issue(mut self, key: &str, fields: Value) -> Self {
    let fields = match fields {
      Value::Object(map) => map.into_iter().collect(),
      _ => HashMap::new(),
    };
    self.issues.insert(key.to_string(), fields);
    self
  }

  pub fn with_edit_meta(mut self, key: &str, fields: Vec<FieldMeta>) -> Self {
    self.edit_meta.insert(key.to_string(), fields);
    self
  }

  pub fn with_fields(mut self, fields: Vec<FieldMeta>) -> Self {
    self.fields = fields;
    self
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }

  pub fn fail_next(&self, label: &str, errors: Vec<CallError>) {
    self
      .failures
      .lock()
      .unwrap()
      .entry(label.to_string())
      .or_default()
      .extend(errors);
  }

  /// Calls made with exactly this label
  pub fn calls(&self, label: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|c| c.as_str() == label)
      .count()
  }

  /// Calls whose label starts with `prefix`
  pub fn calls_matching(&self, prefix: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|c| c.starts_with(prefix))
      .count()
  }

  pub fn total_calls(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  async fn enter(&self, label: String) -> Result<(), CallError> {
    self.calls.lock().unwrap().push(label.clone());
    if !self.latency.is_zero() {
      tokio::time::sleep(self.latency).await;
    }
    let queued = self
      .failures
      .lock()
      .unwrap()
      .get_mut(&label)
      .and_then(|q| q.pop_front());
    match queued {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}

pub fn field(id: &str, name: &str, custom_type: Option<&str>) -> FieldMeta {
  FieldMeta {
    id: id.to_string(),
    name: name.to_string(),
    custom_type: custom_type.map(String::from),
  }
}

#[async_trait]
impl SprintSource for FakeSource {
  async fn get_sprint(&self, sprint_id: u64) -> Result<Sprint, CallError> {
    self.enter(format!("get_sprint:{}", sprint_id)).await?;
    self
      .sprints
      .get(&sprint_id)
      .cloned()
      .ok_or(CallError::NotFound)
  }

  async fn list_board_sprints(
    &self,
    board_id: u64,
    state: StateFilter,
    start_at: u64,
    max_results: u64,
  ) -> Result<SprintPage, CallError> {
    self
      .enter(format!("list_board_sprints:{}:{}", board_id, start_at))
      .await?;
    let all: Vec<Sprint> = self
      .boards
      .get(&board_id)
      .ok_or(CallError::NotFound)?
      .iter()
      .filter(|s| match state.as_param() {
        Some(wanted) => format!("{:?}", s.state).to_lowercase() == wanted,
        None => true,
      })
      .cloned()
      .collect();

    let start = (start_at as usize).min(all.len());
    let end = (start + max_results as usize).min(all.len());
    Ok(SprintPage {
      sprints: all[start..end].to_vec(),
      start_at,
      next_start_at: (end < all.len()).then_some(end as u64),
    })
  }

  async fn get_issue(&self, issue_key: &str, fields: &[&str]) -> Result<IssuePayload, CallError> {
    self.enter(format!("get_issue:{}", issue_key)).await?;
    let all = self.issues.get(issue_key).ok_or(CallError::NotFound)?;
    Ok(IssuePayload {
      key: issue_key.to_string(),
      fields: all
        .iter()
        .filter(|(k, _)| fields.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect(),
    })
  }

  async fn get_edit_meta(&self, issue_key: &str) -> Result<Vec<FieldMeta>, CallError> {
    self.enter(format!("get_edit_meta:{}", issue_key)).await?;
    if !self.issues.contains_key(issue_key) {
      return Err(CallError::NotFound);
    }
    Ok(self.edit_meta.get(issue_key).cloned().unwrap_or_default())
  }

  async fn list_fields(&self) -> Result<Vec<FieldMeta>, CallError> {
    self.enter("list_fields".to_string()).await?;
    Ok(self.fields.clone())
  }
}
