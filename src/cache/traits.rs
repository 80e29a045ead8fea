//! Core traits for the caching system.

/// Key for a cached upstream lookup.
///
/// Implementors describe the exact upstream request they stand for, so the
/// hash must change whenever any request parameter changes.
pub trait CacheKey {
  /// Stable, fixed-length identifier used as the table key
  fn cache_hash(&self) -> String;

  /// Human readable form for logs
  fn description(&self) -> String;
}
