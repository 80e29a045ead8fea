//! In-process caching for upstream lookups.
//!
//! Entries are keyed by the shape of the upstream request (see `CacheKey`),
//! so different queries that need the same listing page share one entry.
//! The cache:
//! - expires entries per insertion TTL, lazily on access
//! - runs at most one load per key at a time (single-flight)
//! - never stores a failed load

mod traits;
mod ttl;

pub use traits::CacheKey;
pub use ttl::TtlCache;
