//! Sprint resolution over a Jira-compatible upstream.
//!
//! Resolves a sprint by id, name, issue key, date or date range, with
//! retrying upstream calls, cached board listings and per-request deadlines.

pub mod cache;
pub mod config;
pub mod dates;
pub mod jira;
pub mod logging;
pub mod resolve;
pub mod upstream;

#[cfg(test)]
mod testutil;

pub use resolve::{
  Mode, Query, QueryParams, Resolution, ResolveError, ResolveOptions, Resolver, ResolverCaches,
  ResolverSettings, UnavailableCause,
};
