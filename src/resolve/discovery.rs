//! Locating the custom field that carries sprint membership.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::TtlCache;
use crate::jira::cache::UpstreamKey;
use crate::jira::types::{FieldId, FieldMeta};
use crate::upstream::{UpstreamAdapter, UpstreamError};

/// Schema `custom` type of Jira Software's sprint field
pub const SPRINT_FIELD_SCHEMA: &str = "com.pyxis.greenhopper.jira:gh-sprint";

pub type FieldCache = TtlCache<FieldId, UpstreamError>;

#[derive(Clone)]
pub struct SprintFieldDiscovery {
  upstream: UpstreamAdapter,
  fields: Arc<FieldCache>,
  ttl: Duration,
}

impl SprintFieldDiscovery {
  pub fn new(upstream: UpstreamAdapter, fields: Arc<FieldCache>, ttl: Duration) -> Self {
    Self {
      upstream,
      fields,
      ttl,
    }
  }

  /// Id of the sprint field, discovered through `issue_key` on a cache miss.
  ///
  /// The answer is instance-wide, so it is cached independently of the issue.
  pub async fn find_sprint_field(&self, issue_key: &str) -> Result<FieldId, UpstreamError> {
    let upstream = self.upstream.clone();
    let issue_key = issue_key.to_string();

    self
      .fields
      .get_or_load(&UpstreamKey::SprintField, self.ttl, move || async move {
        discover(&upstream, &issue_key).await
      })
      .await
  }
}

async fn discover(upstream: &UpstreamAdapter, issue_key: &str) -> Result<FieldId, UpstreamError> {
  match upstream.get_edit_meta(issue_key).await {
    Ok(fields) => {
      if let Some(found) = pick_sprint_field(&fields) {
        info!(field = %found, issue_key, "sprint field found in edit metadata");
        return Ok(found);
      }
    }
    // The answer is shared by every issue, so a missing or forbidden
    // triggering issue must not decide it; the catalog needs neither
    Err(UpstreamError::NotFound) => {
      debug!(issue_key, "issue not found for edit metadata, using field catalog");
    }
    Err(UpstreamError::Permanent { status, .. }) => {
      debug!(issue_key, ?status, "edit metadata unavailable, using field catalog");
    }
    Err(e) => return Err(e),
  }

  let catalog = upstream.list_fields().await?;
  match pick_sprint_field(&catalog) {
    Some(found) => {
      info!(field = %found, "sprint field found in field catalog");
      Ok(found)
    }
    None => Err(UpstreamError::NotFound),
  }
}

/// Prefer the schema type; fall back to a field named "Sprint"
fn pick_sprint_field(fields: &[FieldMeta]) -> Option<FieldId> {
  fields
    .iter()
    .find(|f| f.custom_type.as_deref() == Some(SPRINT_FIELD_SCHEMA))
    .or_else(|| fields.iter().find(|f| f.name.eq_ignore_ascii_case("sprint")))
    .map(|f| FieldId(f.id.clone()))
}
