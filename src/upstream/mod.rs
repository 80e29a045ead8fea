//! Upstream seam.
//!
//! `SprintSource` is a single attempt against the upstream; `UpstreamAdapter`
//! wraps it with bounded retries. Every operation here is a read, so repeating
//! one is always safe. Never route a write through the adapter.

mod adapter;
mod backoff;

pub use adapter::{UpstreamAdapter, UpstreamError};
pub use backoff::Backoff;

use async_trait::async_trait;

use crate::jira::types::{FieldMeta, IssuePayload, Sprint, SprintPage, StateFilter};

/// Outcome of a failed single upstream attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
  /// Timeout, connection reset, 408, 429 or 5xx; worth retrying
  #[error("transient upstream failure: {0}")]
  Transient(String),
  /// Rejected request or malformed response; retrying will not help
  #[error("upstream rejected request: {message}")]
  Permanent {
    status: Option<u16>,
    message: String,
  },
  #[error("upstream resource not found")]
  NotFound,
}

impl CallError {
  pub fn is_transient(&self) -> bool {
    matches!(self, CallError::Transient(_))
  }
}

/// Read operations against the agile tracker, one attempt per call.
#[async_trait]
pub trait SprintSource: Send + Sync {
  async fn get_sprint(&self, sprint_id: u64) -> Result<Sprint, CallError>;

  async fn list_board_sprints(
    &self,
    board_id: u64,
    state: StateFilter,
    start_at: u64,
    max_results: u64,
  ) -> Result<SprintPage, CallError>;

  async fn get_issue(&self, issue_key: &str, fields: &[&str]) -> Result<IssuePayload, CallError>;

  /// Field metadata for one issue
  async fn get_edit_meta(&self, issue_key: &str) -> Result<Vec<FieldMeta>, CallError>;

  /// Instance-wide field catalog
  async fn list_fields(&self) -> Result<Vec<FieldMeta>, CallError>;
}
