//! Configuration management for the import pipeline.
//!
//! Configuration can be set via environment variables:
//! - `SHARELINK_PROFILE_PATH` - Optional. Path of the JSON profile document.
//!   Defaults to `~/.sharelink/profile.json`.
//! - `SHARELINK_HTTP_TIMEOUT_SECS` - Optional. Timeout for the model-list
//!   fetch. Defaults to `10`.
//! - `SHARELINK_RECONNECT_SETTLE_MS` - Optional. Extra delay before MCP
//!   reconnect attempts, for stores that acknowledge writes before
//!   durability. Defaults to `0` (the awaited store write is the commit
//!   barrier).
//! - `SHARELINK_LOCK_SECRET` - Optional. Persist the share secret after a
//!   successful decode so later sessions skip the prompt. Defaults to
//!   `false`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::util::env_var_bool;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Import pipeline configuration.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Path of the JSON profile document.
    pub profile_path: PathBuf,

    /// Timeout for the model-list fetch.
    pub http_timeout: Duration,

    /// Extra settle delay before MCP reconnect attempts.
    pub reconnect_settle: Duration,

    /// Persist the share secret on successful decode.
    pub lock_secret: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            profile_path: default_profile_path(),
            http_timeout: Duration::from_secs(10),
            reconnect_settle: Duration::ZERO,
            lock_secret: false,
        }
    }
}

fn default_profile_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".sharelink").join("profile.json")
}

impl ImportConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let profile_path = std::env::var("SHARELINK_PROFILE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_profile_path());

        let http_timeout_secs: u64 = std::env::var("SHARELINK_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("SHARELINK_HTTP_TIMEOUT_SECS".to_string(), format!("{e}"))
            })?;

        let reconnect_settle_ms: u64 = std::env::var("SHARELINK_RECONNECT_SETTLE_MS")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue(
                    "SHARELINK_RECONNECT_SETTLE_MS".to_string(),
                    format!("{e}"),
                )
            })?;

        Ok(Self {
            profile_path,
            http_timeout: Duration::from_secs(http_timeout_secs),
            reconnect_settle: Duration::from_millis(reconnect_settle_ms),
            lock_secret: env_var_bool("SHARELINK_LOCK_SECRET", false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = ImportConfig::default();
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect_settle, Duration::ZERO);
        assert!(!config.lock_secret);
        assert!(config.profile_path.ends_with(".sharelink/profile.json"));
    }
}
