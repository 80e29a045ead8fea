use std::time::{Duration, Instant};

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::{AuthType, Config};
use crate::jira::api_types::{ApiEditMeta, ApiField, ApiIssue, ApiSprint, ApiSprintPage};
use crate::jira::types::{FieldMeta, IssuePayload, Sprint, SprintPage, StateFilter};
use crate::upstream::{CallError, SprintSource};

/// Longest slice of an error body carried into messages
const ERROR_BODY_LIMIT: usize = 800;

/// Credentials sent with every request
#[derive(Clone)]
pub enum Auth {
  /// Cloud: account email + API token
  Basic { user: String, token: String },
  /// On-premise personal access token
  Bearer(String),
}

impl std::fmt::Debug for Auth {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Auth::Basic { user, .. } => write!(f, "Basic({}, ***)", user),
      Auth::Bearer(_) => f.write_str("Bearer(***)"),
    }
  }
}

/// Jira REST client. Each method is exactly one HTTP attempt; retries are
/// the caller's business.
#[derive(Clone)]
pub struct JiraClient {
  http: reqwest::Client,
  base_url: Url,
  auth: Auth,
}

impl JiraClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token()?;

    let auth = match config.jira.effective_auth_type() {
      AuthType::Cloud => {
        let user = config
          .jira
          .email
          .clone()
          .ok_or_else(|| eyre!("jira.email is required for Jira Cloud authentication"))?;
        Auth::Basic { user, token }
      }
      _ => Auth::Bearer(token),
    };

    Self::with_auth(&config.jira.url, auth, config.http.timeout())
  }

  pub fn with_auth(base_url: &str, auth: Auth, timeout: Duration) -> Result<Self> {
    let base_url =
      Url::parse(base_url).map_err(|e| eyre!("Invalid Jira URL {}: {}", base_url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("Invalid Jira URL {}: not a base URL", base_url));
    }

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("sprintd/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      auth,
    })
  }

  /// Build `<base>/<segments...>`, keeping any context path of the base URL
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base_url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    segments: &[&str],
    query: &[(&str, String)],
  ) -> Result<T, CallError> {
    let url = self.endpoint(segments);
    let request = self
      .http
      .get(url.clone())
      .header(ACCEPT, "application/json")
      .query(query);
    let request = match &self.auth {
      Auth::Basic { user, token } => request.basic_auth(user, Some(token)),
      Auth::Bearer(token) => request.bearer_auth(token),
    };

    let started = Instant::now();
    let response = request.send().await;
    debug!(
      path = url.path(),
      elapsed_ms = started.elapsed().as_millis() as u64,
      "jira request"
    );
    let response = response.map_err(transport_error)?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(status_error(status, &body));
    }

    let body = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&body).map_err(|e| CallError::Permanent {
      status: Some(status.as_u16()),
      message: format!("malformed response from {}: {}", url.path(), e),
    })
  }
}

#[async_trait]
impl SprintSource for JiraClient {
  async fn get_sprint(&self, sprint_id: u64) -> Result<Sprint, CallError> {
    let id = sprint_id.to_string();
    let sprint: ApiSprint = self
      .get_json(&["rest", "agile", "1.0", "sprint", &id], &[])
      .await?;
    Ok(sprint.into())
  }

  async fn list_board_sprints(
    &self,
    board_id: u64,
    state: StateFilter,
    start_at: u64,
    max_results: u64,
  ) -> Result<SprintPage, CallError> {
    let id = board_id.to_string();
    let mut query = vec![
      ("startAt", start_at.to_string()),
      ("maxResults", max_results.to_string()),
    ];
    if let Some(state) = state.as_param() {
      query.push(("state", state.to_string()));
    }

    let page: ApiSprintPage = self
      .get_json(&["rest", "agile", "1.0", "board", &id, "sprint"], &query)
      .await?;
    Ok(page.into_page(start_at))
  }

  async fn get_issue(&self, issue_key: &str, fields: &[&str]) -> Result<IssuePayload, CallError> {
    let query = [("fields", fields.join(","))];
    let issue: ApiIssue = self
      .get_json(&["rest", "api", "2", "issue", issue_key], &query)
      .await?;
    Ok(issue.into())
  }

  async fn get_edit_meta(&self, issue_key: &str) -> Result<Vec<FieldMeta>, CallError> {
    let meta: ApiEditMeta = self
      .get_json(&["rest", "api", "2", "issue", issue_key, "editmeta"], &[])
      .await?;
    Ok(meta.into_fields())
  }

  async fn list_fields(&self) -> Result<Vec<FieldMeta>, CallError> {
    let fields: Vec<ApiField> = self.get_json(&["rest", "api", "2", "field"], &[]).await?;
    Ok(fields.into_iter().map(FieldMeta::from).collect())
  }
}

/// Classify a non-success HTTP status
fn status_error(status: StatusCode, body: &str) -> CallError {
  let message = format!("HTTP {}: {}", status.as_u16(), flatten_body(body));
  match status {
    StatusCode::NOT_FOUND => CallError::NotFound,
    StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => CallError::Transient(message),
    s if s.is_server_error() => CallError::Transient(message),
    s => CallError::Permanent {
      status: Some(s.as_u16()),
      message,
    },
  }
}

/// Classify a failure below HTTP (connect, timeout, body read)
fn transport_error(err: reqwest::Error) -> CallError {
  if err.is_builder() || err.is_decode() || err.is_redirect() {
    CallError::Permanent {
      status: err.status().map(|s| s.as_u16()),
      message: err.to_string(),
    }
  } else {
    CallError::Transient(err.to_string())
  }
}

fn flatten_body(body: &str) -> String {
  body
    .replace(['\n', '\r'], " ")
    .chars()
    .take(ERROR_BODY_LIMIT)
    .collect()
}
