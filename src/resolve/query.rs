use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::Instant;

use super::ResolveError;
use crate::jira::types::StateFilter;

/// Whether an issue lookup returns one sprint or all of them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
  #[default]
  Single,
  List,
}

/// A validated resolution query; exactly one selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
  ById(u64),
  ByName(String),
  ByIssueKey { issue_key: String, mode: Mode },
  ByDate(NaiveDate),
  ByDateRange { start: NaiveDate, end: NaiveDate },
}

impl Query {
  /// Short name of the strategy used for this query
  pub fn strategy(&self) -> &'static str {
    match self {
      Query::ById(_) => "sprint_id",
      Query::ByName(_) => "sprint_name",
      Query::ByIssueKey { .. } => "issue_key",
      Query::ByDate(_) => "date",
      Query::ByDateRange { .. } => "date_range",
    }
  }
}

/// Loose request-layer selectors, any subset of which may be set
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
  pub sprint_id: Option<u64>,
  pub sprint_name: Option<String>,
  pub issue_key: Option<String>,
  pub date: Option<NaiveDate>,
  pub start_date: Option<NaiveDate>,
  pub end_date: Option<NaiveDate>,
  pub mode: Mode,
}

impl QueryParams {
  /// Whether any selector is set, valid or not
  pub fn has_selector(&self) -> bool {
    self.sprint_id.is_some()
      || self.sprint_name.is_some()
      || self.issue_key.is_some()
      || self.date.is_some()
      || self.start_date.is_some()
      || self.end_date.is_some()
  }

  /// Validate into a `Query`.
  ///
  /// `start_date` and `end_date` together count as one selector; either
  /// alone is an error. A reversed range is swapped.
  pub fn into_query(self) -> Result<Query, ResolveError> {
    let mut selected = Vec::new();

    if let Some(id) = self.sprint_id {
      if id == 0 {
        return Err(ResolveError::InvalidQuery("sprint_id must be positive".into()));
      }
      selected.push(Query::ById(id));
    }
    if let Some(name) = self.sprint_name {
      if name.trim().is_empty() {
        return Err(ResolveError::InvalidQuery("sprint_name must not be empty".into()));
      }
      selected.push(Query::ByName(name));
    }
    if let Some(key) = self.issue_key {
      let key = key.trim();
      if key.is_empty() {
        return Err(ResolveError::InvalidQuery("issue_key must not be empty".into()));
      }
      selected.push(Query::ByIssueKey {
        issue_key: key.to_string(),
        mode: self.mode,
      });
    }
    if let Some(date) = self.date {
      selected.push(Query::ByDate(date));
    }
    match (self.start_date, self.end_date) {
      (Some(a), Some(b)) => selected.push(Query::ByDateRange {
        start: a.min(b),
        end: a.max(b),
      }),
      (None, None) => {}
      _ => {
        return Err(ResolveError::InvalidQuery(
          "start_date and end_date must be given together".into(),
        ))
      }
    }

    match selected.len() {
      1 => Ok(selected.remove(0)),
      0 => Err(ResolveError::InvalidQuery(
        "provide one of: sprint_id, sprint_name, issue_key, date, start_date+end_date".into(),
      )),
      _ => Err(ResolveError::InvalidQuery(format!(
        "provide exactly one selector, got {}",
        selected
          .iter()
          .map(Query::strategy)
          .collect::<Vec<_>>()
          .join(", ")
      ))),
    }
  }
}

/// Per-request resolution options
#[derive(Debug, Clone)]
pub struct ResolveOptions {
  /// Boards to search, highest priority first
  pub board_scope: Vec<u64>,
  /// Search every known board when `board_scope` is empty
  pub cross_board: bool,
  /// Collapse date matches to the latest sprint
  pub single_result: bool,
  pub state: StateFilter,
  pub deadline: Instant,
}

impl ResolveOptions {
  /// Options whose deadline is `timeout` from now
  pub fn within(timeout: Duration) -> Self {
    Self {
      board_scope: Vec::new(),
      cross_board: false,
      single_result: false,
      state: StateFilter::All,
      deadline: Instant::now() + timeout,
    }
  }

  pub fn with_boards(mut self, boards: impl IntoIterator<Item = u64>) -> Self {
    self.board_scope = boards.into_iter().collect();
    self
  }

  pub fn cross_board(mut self) -> Self {
    self.cross_board = true;
    self
  }

  pub fn single_result(mut self) -> Self {
    self.single_result = true;
    self
  }

  pub fn with_state(mut self, state: StateFilter) -> Self {
    self.state = state;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  #[test]
  fn test_single_selector() {
    let query = QueryParams {
      issue_key: Some(" PROJ-7 ".into()),
      mode: Mode::List,
      ..Default::default()
    }
    .into_query()
    .unwrap();

    assert_eq!(
      query,
      Query::ByIssueKey {
        issue_key: "PROJ-7".into(),
        mode: Mode::List
      }
    );
  }

  #[test]
  fn test_has_selector() {
    assert!(!QueryParams::default().has_selector());
    assert!(QueryParams {
      end_date: Some(d(2026, 1, 1)),
      ..Default::default()
    }
    .has_selector());
    assert!(QueryParams {
      sprint_name: Some(String::new()),
      ..Default::default()
    }
    .has_selector());
  }

  #[test]
  fn test_no_selector_is_invalid() {
    assert!(matches!(
      QueryParams::default().into_query(),
      Err(ResolveError::InvalidQuery(_))
    ));
  }

  #[test]
  fn test_multiple_selectors_are_invalid() {
    let result = QueryParams {
      sprint_id: Some(4),
      sprint_name: Some("Sprint 4".into()),
      ..Default::default()
    }
    .into_query();

    match result {
      Err(ResolveError::InvalidQuery(msg)) => {
        assert!(msg.contains("sprint_id") && msg.contains("sprint_name"))
      }
      other => panic!("expected invalid query, got {:?}", other),
    }
  }

  #[test]
  fn test_half_range_is_invalid() {
    let result = QueryParams {
      start_date: Some(d(2026, 1, 1)),
      ..Default::default()
    }
    .into_query();
    assert!(matches!(result, Err(ResolveError::InvalidQuery(_))));
  }

  #[test]
  fn test_reversed_range_is_swapped() {
    let query = QueryParams {
      start_date: Some(d(2026, 2, 1)),
      end_date: Some(d(2026, 1, 1)),
      ..Default::default()
    }
    .into_query()
    .unwrap();

    assert_eq!(
      query,
      Query::ByDateRange {
        start: d(2026, 1, 1),
        end: d(2026, 2, 1)
      }
    );
  }

  #[test]
  fn test_blank_values_are_invalid() {
    for params in [
      QueryParams {
        sprint_name: Some("  ".into()),
        ..Default::default()
      },
      QueryParams {
        issue_key: Some(String::new()),
        ..Default::default()
      },
      QueryParams {
        sprint_id: Some(0),
        ..Default::default()
      },
    ] {
      assert!(matches!(
        params.into_query(),
        Err(ResolveError::InvalidQuery(_))
      ));
    }
  }
}
