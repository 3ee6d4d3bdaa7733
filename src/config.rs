//! Configuration
//!
//! Defaults cover the common case; a YAML file can override any field and
//! command-line flags override the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FriendGraphConfig {
    /// Base directory; each owner gets `<data_dir>/<ownerName>/`
    pub data_dir: PathBuf,
    /// OAuth application (client) id
    pub app_id: Option<String>,
    /// Local port for the OAuth redirect
    pub callback_port: u16,
    /// Graph API root
    pub graph_api_url: String,
    /// Graph API version segment
    pub api_version: String,
    /// Per-request timeout for the Graph API client
    pub request_timeout_secs: u64,
    /// How long to wait for the user to finish logging in
    pub login_timeout_secs: u64,
}

impl Default for FriendGraphConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("FacebookData"),
            app_id: None,
            callback_port: 8008,
            graph_api_url: "https://graph.facebook.com".to_string(),
            api_version: "v2.9".to_string(),
            request_timeout_secs: 60,
            login_timeout_secs: 300,
        }
    }
}

impl FriendGraphConfig {
    /// Load from a YAML file; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
