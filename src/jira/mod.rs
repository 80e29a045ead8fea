//! Jira REST upstream: HTTP client, wire types and domain types.

pub mod api_types;
pub mod cache;
pub mod client;
pub mod types;

pub use client::{Auth, JiraClient};
pub use types::{FieldId, Sprint, SprintPage, SprintState, StateFilter};
