use crate::core::cycle::{DEFAULT_MIN_RECHECK_INTERVAL, DEFAULT_WATCH_RETRY_LIMIT};
use crate::core::error::{Error, Result};
use crate::utils::default_config_path;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable overriding the ufw binary
pub const UFW_COMMAND_ENV: &str = "CUFW_UFW_COMMAND";

/// Persistent settings, read from `config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_ufw_path")]
    pub ufw_path: String,
    /// Pause between immediate watch-mode cycles; 0 re-checks without pausing
    #[serde(default = "default_min_recheck_interval_ms")]
    pub min_recheck_interval_ms: u64,
    /// Consecutive incomplete watch cycles before giving up
    #[serde(default = "default_watch_retry_limit")]
    pub watch_retry_limit: u32,
    #[serde(default = "default_true")]
    pub audit_log: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ufw_path: default_ufw_path(),
            min_recheck_interval_ms: default_min_recheck_interval_ms(),
            watch_retry_limit: default_watch_retry_limit(),
            audit_log: true,
        }
    }
}

impl Settings {
    pub fn min_recheck_interval(&self) -> Duration {
        Duration::from_millis(self.min_recheck_interval_ms)
    }

    /// Applies `CUFW_UFW_COMMAND` when set and non-empty
    pub fn apply_env(&mut self) {
        if let Ok(command) = std::env::var(UFW_COMMAND_ENV)
            && !command.is_empty()
        {
            debug!("Using ufw from {UFW_COMMAND_ENV}: {command}");
            self.ufw_path = command;
        }
    }
}

fn default_ufw_path() -> String {
    crate::SYSTEM_UFW_PATH.to_string()
}

fn default_min_recheck_interval_ms() -> u64 {
    u64::try_from(DEFAULT_MIN_RECHECK_INTERVAL.as_millis()).unwrap_or(u64::MAX)
}

fn default_watch_retry_limit() -> u32 {
    DEFAULT_WATCH_RETRY_LIMIT
}

fn default_true() -> bool {
    true
}

/// Loads settings from `path`, or from the default location when `None`
///
/// A missing or unreadable default file yields defaults. An explicitly
/// named file must exist and parse.
///
/// # Errors
///
/// Returns `Err` if an explicit `path` cannot be read or is not valid JSON.
pub async fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => {
            let json = tokio::fs::read_to_string(path).await.map_err(|e| {
                Error::Config(format!("cannot read {}: {e}", path.display()))
            })?;
            serde_json::from_str::<Settings>(&json)
                .map_err(|e| Error::Config(format!("invalid {}: {e}", path.display())))?
        }
        None => load_default().await,
    };

    settings.apply_env();
    Ok(settings)
}

async fn load_default() -> Settings {
    let Some(path) = default_config_path() else {
        return Settings::default();
    };

    match tokio::fs::read_to_string(&path).await {
        Ok(json) => serde_json::from_str::<Settings>(&json).unwrap_or_else(|e| {
            warn!("Ignoring invalid {}: {e}", path.display());
            Settings::default()
        }),
        Err(_) => Settings::default(),
    }
}
