//! CLI configuration.
//!
//! Stored as TOML at `~/.config/hpcxfer/config.toml` unless `--config`
//! points elsewhere. A missing file means all defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hpcxfer_gateway::DEFAULT_SMALL_FILE_LIMIT;
use hpcxfer_large_transfer::{PollConfig, UploadOptions};
use serde::{Deserialize, Serialize};

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Gateway base URL.
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Target cluster name.
    #[serde(default)]
    pub system: String,

    /// Project account charged for transfer jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    /// JSON file with `ClientID`, `ClientSecret` and the token `Url`.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// "Not found" answers tolerated while waiting for a job.
    #[serde(default = "default_not_found_attempts")]
    pub not_found_attempts: u32,

    /// Poll delay multiplier while a job is not found (1.0 = fixed).
    #[serde(default = "default_not_found_backoff")]
    pub not_found_backoff: f64,

    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,

    /// Files up to this size (bytes) skip object storage.
    #[serde(default = "default_small_file_limit")]
    pub small_file_limit: u64,

    /// Part uploads in flight at once.
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,
}

fn default_gateway_url() -> String {
    "http://localhost:8000".into()
}

fn default_credentials_file() -> PathBuf {
    config_dir().join("credentials.json")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_not_found_attempts() -> u32 {
    10
}

fn default_not_found_backoff() -> f64 {
    1.0
}

fn default_max_poll_interval_ms() -> u64 {
    30_000
}

fn default_small_file_limit() -> u64 {
    DEFAULT_SMALL_FILE_LIMIT
}

fn default_upload_concurrency() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            system: String::new(),
            account: None,
            credentials_file: default_credentials_file(),
            poll_interval_ms: default_poll_interval_ms(),
            not_found_attempts: default_not_found_attempts(),
            not_found_backoff: default_not_found_backoff(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            small_file_limit: default_small_file_limit(),
            upload_concurrency: default_upload_concurrency(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or defaults if it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.credentials_file = expand_home(&config.credentials_file);
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            not_found_attempts: self.not_found_attempts,
            not_found_backoff: self.not_found_backoff,
            max_interval: Duration::from_millis(self.max_poll_interval_ms),
        }
    }

    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            concurrency: self.upload_concurrency.max(1),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn config_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".config").join("hpcxfer")
}

/// Expands a leading `~/` to `$HOME`.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var("HOME")) {
        (Ok(rest), Ok(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
