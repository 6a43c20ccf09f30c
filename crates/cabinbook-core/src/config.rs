//! Application configuration management.
//!
//! Configuration is stored at `~/.config/cabinbook/config.json` and holds
//! the backend base URL, the refresh timeout, and the last used username.
//! The `CABINBOOK_API_BASE_URL` environment variable overrides the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "cabinbook";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable selecting the backend base URL
pub const API_BASE_URL_ENV: &str = "CABINBOOK_API_BASE_URL";

/// Environment variable overriding where the session record is kept
pub const DATA_DIR_ENV: &str = "CABINBOOK_DATA_DIR";

/// Local development backend
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/";

/// Upper bound on one token refresh exchange
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub last_username: Option<String>,
    pub refresh_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Base URL from the environment, then the config file, then the default
    pub fn api_base_url(&self) -> String {
        self.resolve_base_url(std::env::var(API_BASE_URL_ENV).ok())
    }

    fn resolve_base_url(&self, from_env: Option<String>) -> String {
        from_env
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(
            self.refresh_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REFRESH_TIMEOUT_SECS),
        )
    }

    /// Directory holding the session record
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_base_url_resolution_order() {
        let config = Config::default();
        assert_eq!(config.resolve_base_url(None), DEFAULT_API_BASE_URL);

        let config = Config {
            api_base_url: Some("https://booking.example.com/api/".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_base_url(None),
            "https://booking.example.com/api/"
        );
        assert_eq!(
            config.resolve_base_url(Some("http://10.0.0.5:8000/api/".to_string())),
            "http://10.0.0.5:8000/api/"
        );
        assert_eq!(
            config.resolve_base_url(Some("  ".to_string())),
            "https://booking.example.com/api/"
        );
    }

    #[test]
    fn test_refresh_timeout_default() {
        assert_eq!(
            Config::default().refresh_timeout(),
            Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS)
        );
        let config = Config {
            refresh_timeout_secs: Some(3),
            ..Default::default()
        };
        assert_eq!(config.refresh_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("cabinbook").join(CONFIG_FILE);
        assert!(Config::load_from(&path).expect("load").last_username.is_none());

        let config = Config {
            last_username: Some("alice".to_string()),
            ..Default::default()
        };
        config.save_to(&path).expect("save");
        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.last_username.as_deref(), Some("alice"));
    }
}
