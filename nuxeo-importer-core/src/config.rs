use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_ACE_PRINCIPAL: &str = "quality";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_concurrent_requests must be at least 1")]
    NoConcurrency,
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("remote_path must be absolute (start with '/'), got {0:?}")]
    RelativeRemotePath(String),
}

/// What happens to the rest of the run when a folder cannot be created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FolderFailurePolicy {
    /// Record the failure and never visit the folder's children.
    #[default]
    SkipSubtree,
    /// Stop starting new tasks; in-flight ones finish and the report is still produced.
    AbortRun,
}

/// Connection settings for the remote repository.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub base_url: String,
    pub username: String,
    /// Never read from the config file; injected from the environment.
    #[serde(skip_serializing, default)]
    pub password: String,
    /// Per-request timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl ConnectionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Empty("base_url"));
        }
        if self.username.is_empty() {
            return Err(ConfigError::Empty("username"));
        }
        Ok(())
    }
}

/// Everything the scheduler needs to run one import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Local file or directory to import. Expected absolute by the time it
    /// reaches the scheduler, see [`crate::walker::resolve_local_path`].
    pub local_path: PathBuf,
    /// Remote parent under which the root is materialized.
    pub remote_path: String,
    pub max_concurrent_requests: usize,
    #[serde(default)]
    pub on_folder_failure: FolderFailurePolicy,
    #[serde(default = "default_ace_principal")]
    pub ace_principal: String,
    /// Asks the caller for step-by-step logging and full error detail in the
    /// report. The scheduler itself never reads it.
    #[serde(default)]
    pub verbose: bool,
}

fn default_ace_principal() -> String {
    DEFAULT_ACE_PRINCIPAL.to_string()
}

impl ImportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::NoConcurrency);
        }
        if self.remote_path.is_empty() {
            return Err(ConfigError::Empty("remote_path"));
        }
        if !self.remote_path.starts_with('/') {
            return Err(ConfigError::RelativeRemotePath(self.remote_path.clone()));
        }
        if self.ace_principal.is_empty() {
            return Err(ConfigError::Empty("ace_principal"));
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            local_path = %self.local_path.display(),
            remote_path = %self.remote_path,
            max_concurrent_requests = self.max_concurrent_requests,
            on_folder_failure = ?self.on_folder_failure,
            "Loaded ImportConfig"
        );
        debug!(?self, "ImportConfig loaded (full debug)");
    }
}
