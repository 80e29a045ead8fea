//! Cache keys for Jira upstream requests.

use sha2::{Digest, Sha256};

use crate::cache::CacheKey;

use super::types::StateFilter;

/// Upstream request shapes whose answers are cached.
///
/// Keys follow the request, not the resolution query, so a listing page
/// fetched for a name lookup is reused by a date lookup on the same board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpstreamKey {
  /// One page of a board's sprint listing
  SprintPage {
    board_id: u64,
    state: StateFilter,
    start_at: u64,
    max_results: u64,
  },
  /// Which custom field carries sprint membership. Instance-wide, so it
  /// does not depend on the issue used to discover it
  SprintField,
}

impl CacheKey for UpstreamKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::SprintPage {
        board_id,
        state,
        start_at,
        max_results,
      } => format!(
        "sprint_page:{}:{}:{}:{}",
        board_id,
        state.as_str(),
        start_at,
        max_results
      ),
      Self::SprintField => "sprint_field".to_string(),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    match self {
      Self::SprintPage {
        board_id,
        state,
        start_at,
        ..
      } => format!(
        "board {} sprints ({}) from {}",
        board_id,
        state.as_str(),
        start_at
      ),
      Self::SprintField => "sprint field id".to_string(),
    }
  }
}
