//! Retrying wrapper around a `SprintSource`.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{Backoff, CallError, SprintSource};
use crate::jira::types::{FieldMeta, IssuePayload, Sprint, SprintPage, StateFilter};

/// Failure of an upstream call after the retry policy has run its course
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
  #[error("upstream still failing after {attempts} attempts: {cause}")]
  Exhausted { attempts: u32, cause: String },
  #[error("upstream rejected request: {message}")]
  Permanent {
    status: Option<u16>,
    message: String,
  },
  #[error("upstream resource not found")]
  NotFound,
}

/// Retry bookkeeping for one call chain
struct AttemptState {
  attempt: u32,
  last_error: Option<String>,
}

/// Upstream client that retries transient failures with backoff.
///
/// Permanent failures and not-found answers return on first sight.
#[derive(Clone)]
pub struct UpstreamAdapter {
  source: Arc<dyn SprintSource>,
  backoff: Backoff,
  max_attempts: u32,
}

impl UpstreamAdapter {
  pub fn new(source: Arc<dyn SprintSource>, backoff: Backoff, max_attempts: u32) -> Self {
    Self {
      source,
      backoff,
      max_attempts: max_attempts.max(1),
    }
  }

  /// Run `operation` until it succeeds, fails permanently, or
  /// `max_attempts` transient failures have been seen.
  pub async fn call<T, F, Fut>(
    &self,
    name: &str,
    max_attempts: u32,
    mut operation: F,
  ) -> Result<T, UpstreamError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
  {
    let max_attempts = max_attempts.max(1);
    let mut state = AttemptState {
      attempt: 1,
      last_error: None,
    };

    loop {
      debug!(operation = name, "attempt {} of {}", state.attempt, max_attempts);

      match operation().await {
        Ok(value) => return Ok(value),
        Err(CallError::NotFound) => return Err(UpstreamError::NotFound),
        Err(CallError::Permanent { status, message }) => {
          warn!(operation = name, ?status, "permanent upstream failure: {}", message);
          return Err(UpstreamError::Permanent { status, message });
        }
        Err(CallError::Transient(cause)) => {
          if state.attempt >= max_attempts {
            state.last_error = Some(cause);
            break;
          }
          let delay = self.backoff.delay(state.attempt);
          warn!(
            operation = name,
            attempt = state.attempt,
            delay_ms = delay.as_millis() as u64,
            "transient upstream failure, retrying: {}",
            cause
          );
          state.last_error = Some(cause);
          tokio::time::sleep(delay).await;
          state.attempt += 1;
        }
      }
    }

    let cause = state.last_error.unwrap_or_default();
    warn!(operation = name, attempts = state.attempt, "upstream retries exhausted: {}", cause);
    Err(UpstreamError::Exhausted {
      attempts: state.attempt,
      cause,
    })
  }

  pub async fn get_sprint(&self, sprint_id: u64) -> Result<Sprint, UpstreamError> {
    self
      .call("get_sprint", self.max_attempts, || {
        self.source.get_sprint(sprint_id)
      })
      .await
  }

  pub async fn list_board_sprints(
    &self,
    board_id: u64,
    state: StateFilter,
    start_at: u64,
    max_results: u64,
  ) -> Result<SprintPage, UpstreamError> {
    self
      .call("list_board_sprints", self.max_attempts, || {
        self
          .source
          .list_board_sprints(board_id, state, start_at, max_results)
      })
      .await
  }

  pub async fn get_issue(
    &self,
    issue_key: &str,
    fields: &[&str],
  ) -> Result<IssuePayload, UpstreamError> {
    self
      .call("get_issue", self.max_attempts, || {
        self.source.get_issue(issue_key, fields)
      })
      .await
  }

  pub async fn get_edit_meta(&self, issue_key: &str) -> Result<Vec<FieldMeta>, UpstreamError> {
    self
      .call("get_edit_meta", self.max_attempts, || {
        self.source.get_edit_meta(issue_key)
      })
      .await
  }

  pub async fn list_fields(&self) -> Result<Vec<FieldMeta>, UpstreamError> {
    self
      .call("list_fields", self.max_attempts, || self.source.list_fields())
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testutil::{fast_adapter, sprint, FakeSource};
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Mutex;
  use std::time::Duration;

  fn scripted(
    outcomes: Vec<Result<u32, CallError>>,
  ) -> (
    Arc<AtomicU32>,
    impl FnMut() -> futures::future::Ready<Result<u32, CallError>>,
  ) {
    let calls = Arc::new(AtomicU32::new(0));
    let outcomes = Mutex::new(outcomes.into_iter());
    let counter = Arc::clone(&calls);
    let op = move || {
      counter.fetch_add(1, Ordering::SeqCst);
      let next = outcomes
        .lock()
        .unwrap()
        .next()
        .unwrap_or_else(|| Err(CallError::Transient("script ran out".into())));
      futures::future::ready(next)
    };
    (calls, op)
  }

  #[tokio::test]
  async fn test_transient_failures_are_retried() {
    let adapter = fast_adapter(Arc::new(FakeSource::default()), 3);
    let (calls, op) = scripted(vec![
      Err(CallError::Transient("reset".into())),
      Err(CallError::Transient("503".into())),
      Ok(42),
    ]);

    assert_eq!(adapter.call("op", 3, op).await, Ok(42));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_exhaustion_keeps_last_cause() {
    let adapter = fast_adapter(Arc::new(FakeSource::default()), 3);
    let (calls, op) = scripted(vec![
      Err(CallError::Transient("first".into())),
      Err(CallError::Transient("second".into())),
      Err(CallError::Transient("third".into())),
    ]);

    let result = adapter.call("op", 3, op).await;
    assert_eq!(
      result,
      Err(UpstreamError::Exhausted {
        attempts: 3,
        cause: "third".into()
      })
    );
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_permanent_failure_is_not_retried() {
    let adapter = fast_adapter(Arc::new(FakeSource::default()), 5);
    let (calls, op) = scripted(vec![Err(CallError::Permanent {
      status: Some(400),
      message: "bad jql".into(),
    })]);

    let result = adapter.call("op", 5, op).await;
    assert!(matches!(
      result,
      Err(UpstreamError::Permanent {
        status: Some(400),
        ..
      })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_not_found_is_not_retried() {
    let adapter = fast_adapter(Arc::new(FakeSource::default()), 5);
    let (calls, op) = scripted(vec![Err(CallError::NotFound)]);

    assert_eq!(adapter.call("op", 5, op).await, Err(UpstreamError::NotFound));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_zero_attempts_still_tries_once() {
    let adapter = fast_adapter(Arc::new(FakeSource::default()), 1);
    let (calls, op) = scripted(vec![Ok(1)]);

    assert_eq!(adapter.call("op", 0, op).await, Ok(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_backoff_sleeps_between_attempts() {
    let source = Arc::new(FakeSource::default().with_sprint(sprint(5, "Five")));
    source.fail_next(
      "get_sprint:5",
      vec![
        CallError::Transient("503".into()),
        CallError::Transient("503".into()),
      ],
    );
    let adapter = UpstreamAdapter::new(
      source.clone(),
      Backoff::new(Duration::from_millis(20), Duration::from_millis(20), 0.0),
      3,
    );

    let started = tokio::time::Instant::now();
    let found = adapter.get_sprint(5).await.unwrap();
    assert_eq!(found.id, 5);
    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(source.calls("get_sprint:5"), 3);
  }
}
