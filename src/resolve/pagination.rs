//! Board sprint pagination.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::jira::cache::UpstreamKey;
use crate::jira::types::{Sprint, SprintPage, StateFilter};
use crate::upstream::{UpstreamAdapter, UpstreamError};

pub type PageCache = TtlCache<SprintPage, UpstreamError>;

/// Walks a board's sprint listing page by page, through the page cache.
#[derive(Clone)]
pub struct Paginator {
  upstream: UpstreamAdapter,
  pages: Arc<PageCache>,
  ttl: Duration,
  page_size: u64,
}

impl Paginator {
  pub fn new(upstream: UpstreamAdapter, pages: Arc<PageCache>, ttl: Duration, page_size: u64) -> Self {
    Self {
      upstream,
      pages,
      ttl,
      page_size: page_size.max(1),
    }
  }

  /// Every sprint on the board, in page order.
  ///
  /// Stops at the upstream's last page or after `page_cap` pages. A failing
  /// page aborts the whole collection.
  pub async fn collect_all(
    &self,
    board_id: u64,
    state: StateFilter,
    page_cap: usize,
  ) -> Result<Vec<Sprint>, UpstreamError> {
    let mut sprints = Vec::new();
    let mut start_at = 0;

    for fetched in 1..=page_cap.max(1) {
      let page = self.page(board_id, state, start_at, self.page_size).await?;
      sprints.extend(page.sprints);

      match page.next_start_at {
        Some(next) if next > start_at => start_at = next,
        Some(next) => {
          // A continuation that does not advance would loop forever
          warn!(board_id, start_at, next, "board listing did not advance, stopping");
          return Ok(sprints);
        }
        None => {
          debug!(board_id, pages = fetched, count = sprints.len(), "collected board sprints");
          return Ok(sprints);
        }
      }
    }

    warn!(board_id, page_cap, "board listing hit the page cap, stopping");
    Ok(sprints)
  }

  /// One page of the board listing
  pub async fn page(
    &self,
    board_id: u64,
    state: StateFilter,
    start_at: u64,
    max_results: u64,
  ) -> Result<SprintPage, UpstreamError> {
    let key = UpstreamKey::SprintPage {
      board_id,
      state,
      start_at,
      max_results,
    };
    let upstream = self.upstream.clone();

    self
      .pages
      .get_or_load(&key, self.ttl, move || async move {
        upstream
          .list_board_sprints(board_id, state, start_at, max_results)
          .await
      })
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testutil::{fast_adapter, sprint, FakeSource};
  use crate::upstream::CallError;

  fn board(count: u64) -> Vec<Sprint> {
    (1..=count).map(|i| sprint(i, &format!("Sprint {}", i))).collect()
  }

  fn paginator(source: &Arc<FakeSource>, page_size: u64) -> Paginator {
    Paginator::new(
      fast_adapter(source.clone(), 3),
      Arc::new(PageCache::new()),
      Duration::from_secs(60),
      page_size,
    )
  }

  fn ids(sprints: &[Sprint]) -> Vec<u64> {
    sprints.iter().map(|s| s.id).collect()
  }

  #[tokio::test]
  async fn test_three_pages_in_order() {
    let source = Arc::new(FakeSource::default().with_board(7, board(7)));
    let sprints = paginator(&source, 3)
      .collect_all(7, StateFilter::All, 10)
      .await
      .unwrap();

    assert_eq!(ids(&sprints), vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(source.calls_matching("list_board_sprints:7:"), 3);
    assert_eq!(source.calls("list_board_sprints:7:0"), 1);
    assert_eq!(source.calls("list_board_sprints:7:3"), 1);
    assert_eq!(source.calls("list_board_sprints:7:6"), 1);
  }

  #[tokio::test]
  async fn test_transient_page_failure_is_invisible() {
    let source = Arc::new(FakeSource::default().with_board(7, board(7)));
    source.fail_next(
      "list_board_sprints:7:3",
      vec![
        CallError::Transient("503".into()),
        CallError::Transient("reset".into()),
      ],
    );

    let sprints = paginator(&source, 3)
      .collect_all(7, StateFilter::All, 10)
      .await
      .unwrap();

    assert_eq!(ids(&sprints), vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(source.calls("list_board_sprints:7:3"), 3);
  }

  #[tokio::test]
  async fn test_page_cap_bounds_fetches() {
    let source = Arc::new(FakeSource::default().with_board(7, board(20)));
    let sprints = paginator(&source, 2)
      .collect_all(7, StateFilter::All, 3)
      .await
      .unwrap();

    assert_eq!(ids(&sprints), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(source.calls_matching("list_board_sprints:7:"), 3);
  }

  #[tokio::test]
  async fn test_failure_aborts_without_partial_result() {
    let source = Arc::new(FakeSource::default().with_board(7, board(7)));
    source.fail_next(
      "list_board_sprints:7:3",
      vec![CallError::Permanent {
        status: Some(403),
        message: "forbidden".into(),
      }],
    );

    let result = paginator(&source, 3).collect_all(7, StateFilter::All, 10).await;
    assert!(matches!(
      result,
      Err(UpstreamError::Permanent {
        status: Some(403),
        ..
      })
    ));
    assert_eq!(source.calls("list_board_sprints:7:6"), 0);
  }

  #[tokio::test]
  async fn test_exhausted_page_surfaces() {
    let source = Arc::new(FakeSource::default().with_board(7, board(4)));
    source.fail_next(
      "list_board_sprints:7:0",
      vec![CallError::Transient("503".into()); 3],
    );

    let result = paginator(&source, 3).collect_all(7, StateFilter::All, 10).await;
    assert!(matches!(result, Err(UpstreamError::Exhausted { attempts: 3, .. })));
  }

  #[tokio::test]
  async fn test_pages_are_served_from_cache() {
    let source = Arc::new(FakeSource::default().with_board(7, board(5)));
    let paginator = paginator(&source, 2);

    let first = paginator.collect_all(7, StateFilter::All, 10).await.unwrap();
    let second = paginator.collect_all(7, StateFilter::All, 10).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(source.calls_matching("list_board_sprints:7:"), 3);
  }

  #[tokio::test]
  async fn test_state_filter_keys_separately() {
    let mut sprints = board(3);
    sprints[2].state = crate::jira::types::SprintState::Active;
    let source = Arc::new(FakeSource::default().with_board(7, sprints));
    let paginator = paginator(&source, 10);

    let active = paginator.collect_all(7, StateFilter::Active, 10).await.unwrap();
    let all = paginator.collect_all(7, StateFilter::All, 10).await.unwrap();

    assert_eq!(ids(&active), vec![3]);
    assert_eq!(all.len(), 3);
    assert_eq!(source.calls("list_board_sprints:7:0"), 2);
  }
}
