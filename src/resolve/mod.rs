//! Sprint resolution.
//!
//! A request-layer `QueryParams` is validated into a `Query`, then the
//! `Resolver` runs the matching strategy against the upstream adapter,
//! reading board listings and the sprint field id through the shared
//! TTL caches.

mod discovery;
mod engine;
mod error;
mod pagination;
mod query;
mod select;

pub use discovery::{FieldCache, SprintFieldDiscovery, SPRINT_FIELD_SCHEMA};
pub use engine::{Resolution, Resolver, ResolverCaches, ResolverSettings, MAX_PAGE_RESULTS};
pub use error::{ResolveError, UnavailableCause};
pub use pagination::{PageCache, Paginator};
pub use query::{Mode, Query, QueryParams, ResolveOptions};
pub use select::{compare_recency, dedup_by_id, pick_latest, rank_most_recent_first};
