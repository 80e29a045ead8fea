//! "Latest sprint" selection policy.
//!
//! One total order decides every pick among several sprints:
//! `complete_date` desc, then `end_date` desc, then `start_date` desc
//! (missing dates rank after present ones at each step), then candidate
//! position, where the later-listed sprint wins.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::jira::types::Sprint;

/// Compare two candidates with their list positions; `Less` ranks first
pub fn compare_recency(a: (usize, &Sprint), b: (usize, &Sprint)) -> Ordering {
  let (pos_a, a) = a;
  let (pos_b, b) = b;

  latest_first(a.complete_date, b.complete_date)
    .then_with(|| latest_first(a.end_date, b.end_date))
    .then_with(|| latest_first(a.start_date, b.start_date))
    .then_with(|| pos_b.cmp(&pos_a))
}

/// Descending order with `None` last
fn latest_first<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
  match (a, b) {
    (Some(a), Some(b)) => b.cmp(&a),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  }
}

/// Order candidates most recent first
pub fn rank_most_recent_first(candidates: Vec<Sprint>) -> Vec<Sprint> {
  let mut indexed: Vec<(usize, Sprint)> = candidates.into_iter().enumerate().collect();
  indexed.sort_by(|(i, a), (j, b)| compare_recency((*i, a), (*j, b)));
  indexed.into_iter().map(|(_, s)| s).collect()
}

/// The single latest candidate, `None` only when there are none
pub fn pick_latest(candidates: Vec<Sprint>) -> Option<Sprint> {
  candidates
    .into_iter()
    .enumerate()
    .min_by(|(i, a), (j, b)| compare_recency((*i, a), (*j, b)))
    .map(|(_, s)| s)
}

/// Drop repeated sprint ids, keeping the first occurrence
pub fn dedup_by_id(sprints: Vec<Sprint>) -> Vec<Sprint> {
  let mut seen = HashSet::new();
  sprints.into_iter().filter(|s| seen.insert(s.id)).collect()
}
