use crate::upstream::UpstreamError;

/// Why the upstream could not answer in time
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnavailableCause {
  #[error("deadline elapsed")]
  Timeout,
  #[error("still failing after {attempts} attempts: {cause}")]
  Exhausted { attempts: u32, cause: String },
  #[error("{message}")]
  PermanentUpstream {
    status: Option<u16>,
    message: String,
  },
}

/// Resolution failures, one per distinct outcome a caller must render
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
  #[error("invalid query: {0}")]
  InvalidQuery(String),
  /// Name/date lookups need a board scope or an explicit cross-board search
  #[error("{0} lookup needs a board scope or cross-board search")]
  AmbiguousScopeMissing(&'static str),
  #[error("no sprint found for {0}")]
  NotFound(String),
  #[error("upstream unavailable: {0}")]
  UpstreamUnavailable(UnavailableCause),
}

impl ResolveError {
  /// Stable machine-readable code
  pub fn code(&self) -> &'static str {
    match self {
      ResolveError::InvalidQuery(_) => "invalid_query",
      ResolveError::AmbiguousScopeMissing(_) => "ambiguous_scope_missing",
      ResolveError::NotFound(_) => "not_found",
      ResolveError::UpstreamUnavailable(UnavailableCause::Timeout) => "upstream_timeout",
      ResolveError::UpstreamUnavailable(UnavailableCause::Exhausted { .. }) => "upstream_exhausted",
      ResolveError::UpstreamUnavailable(UnavailableCause::PermanentUpstream { .. }) => {
        "upstream_error"
      }
    }
  }

  /// Map an upstream failure, naming what was being looked up if it was missing
  pub fn from_upstream(err: UpstreamError, subject: impl FnOnce() -> String) -> Self {
    match err {
      UpstreamError::NotFound => ResolveError::NotFound(subject()),
      UpstreamError::Exhausted { attempts, cause } => {
        ResolveError::UpstreamUnavailable(UnavailableCause::Exhausted { attempts, cause })
      }
      UpstreamError::Permanent { status, message } => {
        ResolveError::UpstreamUnavailable(UnavailableCause::PermanentUpstream { status, message })
      }
    }
  }
}

impl From<UpstreamError> for ResolveError {
  fn from(err: UpstreamError) -> Self {
    Self::from_upstream(err, || "upstream resource".to_string())
  }
}
