//! Configuration loader and validator for the back-office client.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::client::ClientSettings;
use crate::store::StoreSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub api: Api,
    #[serde(default)]
    pub store: Store,
}

/// REST endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Api {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Page-state settings shared by every store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Store {
    pub page_size: u32,
}

impl Default for Store {
    fn default() -> Self {
        Self { page_size: 5 }
    }
}

fn default_user_agent() -> String {
    concat!("backoffice-store/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.api.request_timeout_ms)
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.api.base_url.clone(),
            user_agent: self.api.user_agent.clone(),
            timeout: self.request_timeout(),
            max_retries: self.api.max_retries,
            initial_backoff: Duration::from_millis(self.api.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.api.max_backoff_ms),
        }
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            page_size: self.store.page_size,
            // the store deadline must not cut the client's retries short
            request_timeout: self.client_settings().retry_deadline(),
        }
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `backoffice.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("backoffice.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let base = cfg.api.base_url.trim();
    if base.is_empty() {
        return Err(ConfigError::Invalid("api.base_url must be non-empty"));
    }
    match reqwest::Url::parse(base) {
        Ok(url) if url.cannot_be_a_base() => {
            return Err(ConfigError::Invalid("api.base_url must be a base URL"))
        }
        Ok(_) => {}
        Err(_) => return Err(ConfigError::Invalid("api.base_url must be an absolute URL")),
    }
    if cfg.api.request_timeout_ms == 0 {
        return Err(ConfigError::Invalid("api.request_timeout_ms must be > 0"));
    }
    // max_retries is u32; zero disables retry
    if cfg.api.initial_backoff_ms == 0 {
        return Err(ConfigError::Invalid("api.initial_backoff_ms must be > 0"));
    }
    if cfg.api.max_backoff_ms < cfg.api.initial_backoff_ms {
        return Err(ConfigError::Invalid(
            "api.max_backoff_ms must be >= api.initial_backoff_ms",
        ));
    }
    if cfg.api.user_agent.trim().is_empty() {
        return Err(ConfigError::Invalid("api.user_agent must be non-empty"));
    }

    if cfg.store.page_size == 0 {
        return Err(ConfigError::Invalid("store.page_size must be > 0"));
    }

    Ok(())
}

/// Returns an example YAML document accepted by [`load`].
pub fn example() -> &'static str {
    r#"api:
  base_url: "http://localhost:3000/api/"
  request_timeout_ms: 10000
  max_retries: 2
  initial_backoff_ms: 200
  max_backoff_ms: 2000
  user_agent: "backoffice-store/0.1"

store:
  page_size: 5
"#
}
