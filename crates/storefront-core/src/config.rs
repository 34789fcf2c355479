//! Client configuration management.
//!
//! Holds the storefront base URL, the session endpoint paths, the name of
//! the session marker cookie and the transport timeout. Stored at
//! `~/.config/storefront/config.json`; a missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for the config directory path
const APP_NAME: &str = "storefront";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// HTTP request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_BASE_URL: &str = "STOREFRONT_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "STOREFRONT_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub login_path: String,
    pub refresh_path: String,
    pub logout_path: String,
    pub session_cookie: String,
    pub request_timeout_secs: u64,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            login_path: "/user/login".to_string(),
            refresh_path: "/user/refresh".to_string(),
            logout_path: "/user/logout".to_string(),
            session_cookie: "logged_in".to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
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

    /// Apply `STOREFRONT_*` environment overrides on top of the file values.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = timeout
                .parse()
                .with_context(|| format!("{} must be a number of seconds", ENV_TIMEOUT_SECS))?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("storefront-config-test-missing").join(CONFIG_FILE);
        let config = Config::load_from(&path).expect("defaults");
        assert_eq!(config.refresh_path, "/user/refresh");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("storefront-config-test-{}", std::process::id()));
        let path = dir.join(CONFIG_FILE);

        let config = Config {
            base_url: "https://shop.example.com/api".to_string(),
            last_email: Some("ana@example.com".to_string()),
            ..Config::default()
        };
        config.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.base_url, "https://shop.example.com/api");
        assert_eq!(loaded.last_email.as_deref(), Some("ana@example.com"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"base_url":"https://x.test"}"#).expect("parse");
        assert_eq!(config.base_url, "https://x.test");
        assert_eq!(config.session_cookie, "logged_in");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(|key| match key {
                ENV_BASE_URL => Some("https://staging.example.com".to_string()),
                ENV_TIMEOUT_SECS => Some("5".to_string()),
                _ => None,
            })
            .expect("overrides");
        assert_eq!(config.base_url, "https://staging.example.com");
        assert_eq!(config.request_timeout_secs, 5);

        let err = config.apply_overrides(|key| (key == ENV_TIMEOUT_SECS).then(|| "soon".to_string()));
        assert!(err.is_err());
    }
}
