use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::resolve::ResolverSettings;
use crate::upstream::Backoff;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub jira: JiraConfig,
  #[serde(default)]
  pub boards: BoardsConfig,
  #[serde(default)]
  pub http: HttpConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub resolve: ResolveConfig,
  /// Write logs here instead of stderr
  pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
  /// Auto-detect based on URL: .atlassian.net = cloud, else on-premise
  #[default]
  Auto,
  /// Jira Cloud - uses Basic auth (email + API token as password)
  Cloud,
  /// Jira On-premise - uses Bearer auth (PAT)
  Onpremise,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
  pub url: String,
  /// Account email, required for cloud auth
  pub email: Option<String>,
  /// Authentication type: auto, cloud, or onpremise
  #[serde(default)]
  pub auth_type: AuthType,
}

impl JiraConfig {
  /// Auth type with `auto` resolved against the URL
  pub fn effective_auth_type(&self) -> AuthType {
    match self.auth_type {
      AuthType::Auto => {
        let host = url::Url::parse(&self.url)
          .ok()
          .and_then(|u| u.host_str().map(str::to_lowercase));
        match host {
          Some(h) if h.ends_with(".atlassian.net") => AuthType::Cloud,
          _ => AuthType::Onpremise,
        }
      }
      other => other,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardsConfig {
  /// Boards searched by cross-board queries, in priority order
  #[serde(default)]
  pub known: Vec<u64>,
  /// Board used when a request names no board and does not ask for cross-board search
  pub default: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
  pub timeout_secs: u64,
  pub max_attempts: u32,
  pub backoff_base_ms: u64,
  pub backoff_max_ms: u64,
  pub jitter: f64,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      timeout_secs: 20,
      max_attempts: 4,
      backoff_base_ms: 500,
      backoff_max_ms: 6000,
      jitter: 0.2,
    }
  }
}

impl HttpConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  pub fn backoff(&self) -> Backoff {
    Backoff::new(
      Duration::from_millis(self.backoff_base_ms),
      Duration::from_millis(self.backoff_max_ms),
      self.jitter,
    )
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub enabled: bool,
  pub list_ttl_secs: u64,
  pub field_ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      list_ttl_secs: 60,
      field_ttl_secs: 3600,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
  pub page_size: u64,
  /// Upper bound on pages fetched per board listing
  pub page_cap: usize,
  pub deadline_secs: u64,
}

impl Default for ResolveConfig {
  fn default() -> Self {
    Self {
      page_size: 50,
      page_cap: 200,
      deadline_secs: 30,
    }
  }
}

impl ResolveConfig {
  pub fn deadline(&self) -> Duration {
    Duration::from_secs(self.deadline_secs)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./sprintd.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/sprintd/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/sprintd/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("sprintd.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("sprintd").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.jira.url.trim().is_empty() {
      return Err(eyre!("jira.url must not be empty"));
    }
    Ok(config)
  }

  /// Engine settings derived from the cache and resolve sections
  pub fn resolver_settings(&self) -> ResolverSettings {
    let ttl = |secs: u64| {
      if self.cache.enabled {
        Duration::from_secs(secs)
      } else {
        Duration::ZERO
      }
    };

    ResolverSettings {
      page_size: self.resolve.page_size.max(1),
      page_cap: self.resolve.page_cap.max(1),
      list_ttl: ttl(self.cache.list_ttl_secs),
      field_ttl: ttl(self.cache.field_ttl_secs),
      known_boards: self.boards.known.clone(),
    }
  }

  /// Get the Jira API token from environment variables.
  ///
  /// Checks SPRINTD_JIRA_TOKEN first, then JIRA_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("SPRINTD_JIRA_TOKEN")
      .or_else(|_| std::env::var("JIRA_API_TOKEN"))
      .map_err(|_| {
        eyre!("Jira API token not found. Set SPRINTD_JIRA_TOKEN or JIRA_API_TOKEN environment variable.")
      })
  }
}
