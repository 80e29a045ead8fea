//! Date parsing for request inputs and Jira timestamps.

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::resolve::ResolveError;

/// Parse a request date in `DDMMYYYY` form.
///
/// `field` names the parameter in the error message.
pub fn parse_ddmmyyyy(value: &str, field: &str) -> Result<NaiveDate, ResolveError> {
  let value = value.trim();
  if value.is_empty() {
    return Err(ResolveError::InvalidQuery(format!("{} is required", field)));
  }
  if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
    return Err(ResolveError::InvalidQuery(format!(
      "{} must be in DDMMYYYY format, got {:?}",
      field, value
    )));
  }

  NaiveDate::parse_from_str(value, "%d%m%Y").map_err(|_| {
    ResolveError::InvalidQuery(format!("{} is not a valid date: {:?}", field, value))
  })
}

/// Parse a Jira timestamp such as `2025-01-07T10:00:00.000+05:30`.
///
/// Server instances also emit offsets without a colon (`+0530`).
/// Unparseable values are treated as absent.
pub fn parse_jira_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
  let value = value.trim();
  if value.is_empty() {
    return None;
  }
  DateTime::parse_from_rfc3339(value)
    .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"))
    .ok()
}
