//! Resolution engine: one strategy per query variant.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::discovery::{FieldCache, SprintFieldDiscovery};
use super::pagination::{PageCache, Paginator};
use super::select::{dedup_by_id, pick_latest, rank_most_recent_first};
use super::{Mode, Query, ResolveError, ResolveOptions, UnavailableCause};
use crate::jira::api_types::sprint_refs;
use crate::jira::types::{Sprint, SprintPage, SprintRef, SprintState, StateFilter};
use crate::upstream::{UpstreamAdapter, UpstreamError};

/// Largest page a caller may request from `Resolver::board_sprints`
pub const MAX_PAGE_RESULTS: u64 = 200;

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  Single(Sprint),
  /// Non-empty, in the order the strategy defines
  List(Vec<Sprint>),
}

impl Resolution {
  pub fn mode(&self) -> &'static str {
    match self {
      Resolution::Single(_) => "single",
      Resolution::List(_) => "list",
    }
  }

  pub fn sprints(&self) -> &[Sprint] {
    match self {
      Resolution::Single(sprint) => std::slice::from_ref(sprint),
      Resolution::List(sprints) => sprints,
    }
  }
}

/// Process-wide caches, built once and shared by every `Resolver`
#[derive(Clone, Default)]
pub struct ResolverCaches {
  pub pages: Arc<PageCache>,
  pub fields: Arc<FieldCache>,
}

impl ResolverCaches {
  pub fn new() -> Self {
    Self::default()
  }
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
  pub page_size: u64,
  pub page_cap: usize,
  pub list_ttl: Duration,
  pub field_ttl: Duration,
  /// Cross-board search order
  pub known_boards: Vec<u64>,
}

impl Default for ResolverSettings {
  fn default() -> Self {
    Self {
      page_size: 50,
      page_cap: 200,
      list_ttl: Duration::from_secs(60),
      field_ttl: Duration::from_secs(3600),
      known_boards: Vec::new(),
    }
  }
}

/// Resolves validated queries into sprints.
///
/// Cheap to clone; clones share the adapter and caches.
#[derive(Clone)]
pub struct Resolver {
  upstream: UpstreamAdapter,
  paginator: Paginator,
  discovery: SprintFieldDiscovery,
  page_cap: usize,
  known_boards: Vec<u64>,
}

impl Resolver {
  pub fn new(upstream: UpstreamAdapter, caches: &ResolverCaches, settings: ResolverSettings) -> Self {
    let paginator = Paginator::new(
      upstream.clone(),
      Arc::clone(&caches.pages),
      settings.list_ttl,
      settings.page_size,
    );
    let discovery =
      SprintFieldDiscovery::new(upstream.clone(), Arc::clone(&caches.fields), settings.field_ttl);

    Self {
      upstream,
      paginator,
      discovery,
      page_cap: settings.page_cap.max(1),
      known_boards: settings.known_boards,
    }
  }

  /// Resolve `query` before `options.deadline`.
  ///
  /// When the deadline passes mid-flight the pending upstream call or
  /// backoff sleep is abandoned; shared cache loads keep running for any
  /// other request waiting on them.
  pub async fn resolve(
    &self,
    query: &Query,
    options: &ResolveOptions,
  ) -> Result<Resolution, ResolveError> {
    info!(strategy = query.strategy(), "resolving sprint");

    match tokio::time::timeout_at(options.deadline, self.dispatch(query, options)).await {
      Ok(result) => result,
      Err(_) => {
        warn!(strategy = query.strategy(), "resolution deadline elapsed");
        Err(ResolveError::UpstreamUnavailable(UnavailableCause::Timeout))
      }
    }
  }

  /// Active sprints across the scoped boards, for requests that name no
  /// selector. Board scope rules are the same as for date lookups.
  pub async fn active_sprints(&self, options: &ResolveOptions) -> Result<Resolution, ResolveError> {
    info!(strategy = "active", "resolving sprint");

    match tokio::time::timeout_at(options.deadline, self.by_active_state(options)).await {
      Ok(result) => result,
      Err(_) => {
        warn!(strategy = "active", "resolution deadline elapsed");
        Err(ResolveError::UpstreamUnavailable(UnavailableCause::Timeout))
      }
    }
  }

  /// One page of a board's sprint listing, as the upstream returns it.
  ///
  /// `max_results` is clamped to `1..=MAX_PAGE_RESULTS`.
  pub async fn board_sprints(
    &self,
    board_id: u64,
    state: StateFilter,
    start_at: u64,
    max_results: u64,
    deadline: Instant,
  ) -> Result<SprintPage, ResolveError> {
    let page = self
      .paginator
      .page(board_id, state, start_at, max_results.clamp(1, MAX_PAGE_RESULTS));

    match tokio::time::timeout_at(deadline, page).await {
      Ok(result) => result.map_err(|e| board_error(e, board_id)),
      Err(_) => Err(ResolveError::UpstreamUnavailable(UnavailableCause::Timeout)),
    }
  }

  async fn dispatch(
    &self,
    query: &Query,
    options: &ResolveOptions,
  ) -> Result<Resolution, ResolveError> {
    match query {
      Query::ById(sprint_id) => self.by_id(*sprint_id).await,
      Query::ByName(name) => self.by_name(name, options).await,
      Query::ByIssueKey { issue_key, mode } => self.by_issue_key(issue_key, *mode).await,
      Query::ByDate(date) => self.by_date(*date, options).await,
      Query::ByDateRange { start, end } => self.by_date_range(*start, *end, options).await,
    }
  }

  /// Boards to search, in priority order
  fn boards_in_scope(
    &self,
    options: &ResolveOptions,
    lookup: &'static str,
  ) -> Result<Vec<u64>, ResolveError> {
    let boards = if !options.board_scope.is_empty() {
      &options.board_scope
    } else if options.cross_board && !self.known_boards.is_empty() {
      &self.known_boards
    } else {
      return Err(ResolveError::AmbiguousScopeMissing(lookup));
    };

    let mut ordered = Vec::with_capacity(boards.len());
    for board in boards {
      if !ordered.contains(board) {
        ordered.push(*board);
      }
    }
    Ok(ordered)
  }

  async fn board_listing(
    &self,
    board_id: u64,
    state: StateFilter,
  ) -> Result<Vec<Sprint>, ResolveError> {
    self
      .paginator
      .collect_all(board_id, state, self.page_cap)
      .await
      .map_err(|e| board_error(e, board_id))
  }

  async fn by_active_state(&self, options: &ResolveOptions) -> Result<Resolution, ResolveError> {
    let boards = self.boards_in_scope(options, "active sprint")?;

    let mut active = Vec::new();
    for board_id in boards {
      let sprints = self.board_listing(board_id, StateFilter::Active).await?;
      active.extend(sprints.into_iter().filter(|s| s.state == SprintState::Active));
    }
    let active = dedup_by_id(active);

    if active.is_empty() {
      return Err(ResolveError::NotFound("active sprints".into()));
    }
    Ok(Resolution::List(active))
  }

  async fn by_id(&self, sprint_id: u64) -> Result<Resolution, ResolveError> {
    let sprint = self
      .upstream
      .get_sprint(sprint_id)
      .await
      .map_err(|e| ResolveError::from_upstream(e, || format!("sprint id {}", sprint_id)))?;
    Ok(Resolution::Single(sprint))
  }

  async fn by_name(&self, name: &str, options: &ResolveOptions) -> Result<Resolution, ResolveError> {
    let boards = self.boards_in_scope(options, "sprint name")?;

    // Boards are tried in priority order; the first board with a match wins
    for board_id in boards {
      let sprints = self.board_listing(board_id, options.state).await?;
      if let Some(found) = sprints.into_iter().find(|s| s.name == name) {
        debug!(board_id, sprint_id = found.id, "sprint name matched");
        return Ok(Resolution::Single(found));
      }
    }

    Err(ResolveError::NotFound(format!("sprint name {:?}", name)))
  }

  async fn by_issue_key(&self, issue_key: &str, mode: Mode) -> Result<Resolution, ResolveError> {
    let field = self
      .discovery
      .find_sprint_field(issue_key)
      .await
      .map_err(|e| {
        ResolveError::from_upstream(e, || format!("sprint field via issue {}", issue_key))
      })?;

    let issue = self
      .upstream
      .get_issue(issue_key, &[field.as_str()])
      .await
      .map_err(|e| ResolveError::from_upstream(e, || format!("issue {}", issue_key)))?;

    let refs = issue
      .fields
      .get(field.as_str())
      .map(sprint_refs)
      .unwrap_or_default();

    let mut candidates = Vec::with_capacity(refs.len());
    for sprint_ref in refs {
      match sprint_ref {
        SprintRef::Inline(sprint) => candidates.push(sprint),
        SprintRef::Id(sprint_id) => match self.upstream.get_sprint(sprint_id).await {
          Ok(sprint) => candidates.push(sprint),
          Err(UpstreamError::NotFound) => {
            warn!(issue_key, sprint_id, "issue references a sprint that no longer exists");
          }
          Err(e) => return Err(e.into()),
        },
      }
    }
    let candidates = dedup_by_id(candidates);
    debug!(issue_key, count = candidates.len(), "issue sprint candidates");

    if candidates.is_empty() {
      return Err(ResolveError::NotFound(format!("issue {}", issue_key)));
    }
    Ok(match mode {
      Mode::Single => match pick_latest(candidates) {
        Some(sprint) => Resolution::Single(sprint),
        None => return Err(ResolveError::NotFound(format!("issue {}", issue_key))),
      },
      Mode::List => Resolution::List(rank_most_recent_first(candidates)),
    })
  }

  async fn by_date(&self, date: NaiveDate, options: &ResolveOptions) -> Result<Resolution, ResolveError> {
    let candidates = self
      .matching_sprints(options, "date", |s| s.contains_date(date))
      .await?;

    if candidates.is_empty() {
      return Err(ResolveError::NotFound(format!("date {}", date)));
    }
    if options.single_result {
      if let Some(latest) = pick_latest(candidates) {
        return Ok(Resolution::Single(latest));
      }
      return Err(ResolveError::NotFound(format!("date {}", date)));
    }
    Ok(Resolution::List(candidates))
  }

  async fn by_date_range(
    &self,
    start: NaiveDate,
    end: NaiveDate,
    options: &ResolveOptions,
  ) -> Result<Resolution, ResolveError> {
    let candidates = self
      .matching_sprints(options, "date range", |s| s.overlaps(start, end))
      .await?;

    if candidates.is_empty() {
      return Err(ResolveError::NotFound(format!("dates {} to {}", start, end)));
    }
    Ok(Resolution::List(candidates))
  }

  /// Sprints across the scoped boards that satisfy `keep`, deduplicated
  async fn matching_sprints(
    &self,
    options: &ResolveOptions,
    lookup: &'static str,
    keep: impl Fn(&Sprint) -> bool,
  ) -> Result<Vec<Sprint>, ResolveError> {
    let boards = self.boards_in_scope(options, lookup)?;

    let mut candidates = Vec::new();
    for board_id in boards {
      let sprints = self.board_listing(board_id, options.state).await?;
      candidates.extend(sprints.into_iter().filter(|s| keep(s)));
    }
    Ok(dedup_by_id(candidates))
  }
}

fn board_error(err: UpstreamError, board_id: u64) -> ResolveError {
  ResolveError::from_upstream(err, || format!("board {}", board_id))
}
