pub mod api;
pub mod error;
pub mod event;
pub mod github;
pub mod logging;
pub mod relay;
pub mod slack;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use error::{RelayError, Result};
use relay::Relay;

pub const DEFAULT_GITHUB_ORG: &str = "reflektor-digital-inc";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GITHUB_WEB_URL: &str = "https://github.com";

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default)]
    pub slack_webhook_url: String,
    #[serde(default)]
    pub github_access_token: String,
    #[serde(default = "default_github_org")]
    pub github_org: String,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
    #[serde(default = "default_github_web_url")]
    pub github_web_url: String,
    /// Look up commit message and author for each notification.
    #[serde(default = "default_true")]
    pub enrich_commits: bool,
    #[serde(default)]
    pub trigger_name_to_url_mapping: HashMap<String, String>,
    /// Static bearer token push requests must present. Unset disables the check.
    pub push_token: Option<String>,
    /// Directory for rolling log files. Console only when unset.
    pub log_dir: Option<PathBuf>,
}

fn default_github_org() -> String {
    DEFAULT_GITHUB_ORG.to_string()
}

fn default_github_api_url() -> String {
    DEFAULT_GITHUB_API_URL.to_string()
}

fn default_github_web_url() -> String {
    DEFAULT_GITHUB_WEB_URL.to_string()
}

fn default_true() -> bool {
    true
}

impl RelayConfig {
    /// Parse a TOML document, apply environment overrides and validate.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut config: RelayConfig = toml::from_str(s)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// `SLACK_WEBHOOK_URL` and `GITHUB_ACCESS_TOKEN` take precedence over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SLACK_WEBHOOK_URL") {
            if !url.is_empty() {
                self.slack_webhook_url = url;
            }
        }
        if let Ok(token) = std::env::var("GITHUB_ACCESS_TOKEN") {
            if !token.is_empty() {
                self.github_access_token = token;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.slack_webhook_url.trim().is_empty() {
            return Err(RelayError::Config(
                "slack_webhook_url must be set (config file or SLACK_WEBHOOK_URL)".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns true if the request token matches the configured push token,
    /// or if no push token is configured.
    pub fn accepts_push_token(&self, presented: Option<&str>) -> bool {
        match self.push_token.as_deref() {
            None | Some("") => true,
            Some(expected) => presented == Some(expected),
        }
    }
}

/// Load and parse the configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<RelayConfig> {
    let path = path.as_ref();
    let config_str = std::fs::read_to_string(path).map_err(|e| {
        RelayError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
    })?;

    RelayConfig::from_toml_str(&config_str).map_err(|e| match e {
        RelayError::TomlParse(e) => RelayError::Config(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        )),
        other => other,
    })
}

/// Per-process invocation counters, reset on restart
#[derive(Debug, Default)]
pub struct InvocationCounters {
    pub received: AtomicU64,
    pub skipped: AtomicU64,
    pub dispatched: AtomicU64,
    pub rejected: AtomicU64,
}

pub struct AppState {
    pub relay: Relay,
    pub counters: InvocationCounters,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            relay: Relay::new(config),
            counters: InvocationCounters::default(),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;
