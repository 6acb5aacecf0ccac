use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::conversation::ConversationOptions;
use crate::transport::TransportSettings;
use crate::upload::SUCCESS_DISPLAY;

pub const BASE_URL_ENV: &str = "RAGCHAT_BASE_URL";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub upload_timeout_secs: Option<u64>,
    pub success_banner_secs: Option<u64>,
    pub announce_selection: Option<bool>,
    pub api_token: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {:?}: {}", path, e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Base URL with the environment variable taking precedence over the file.
    pub fn base_url(&self) -> String {
        std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn transport_settings(&self) -> TransportSettings {
        let defaults = TransportSettings::default();
        TransportSettings {
            base_url: self.base_url(),
            request_timeout: self
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            upload_timeout: self
                .upload_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.upload_timeout),
            api_token: self.api_token.clone(),
            ..defaults
        }
    }

    pub fn conversation_options(&self) -> ConversationOptions {
        let defaults = ConversationOptions::default();
        ConversationOptions {
            announce_selection: self.announce_selection.unwrap_or(defaults.announce_selection),
            ..defaults
        }
    }

    pub fn success_display(&self) -> Duration {
        self.success_banner_secs
            .map(Duration::from_secs)
            .unwrap_or(SUCCESS_DISPLAY)
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("ragchat"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.success_display(), Duration::from_secs(5));
        assert!(config.conversation_options().announce_selection);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            base_url: Some("http://rag.internal:9000".to_string()),
            request_timeout_secs: Some(15),
            announce_selection: Some(false),
            ..Config::new()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(!loaded.conversation_options().announce_selection);
    }

    #[test]
    fn test_transport_settings_apply_overrides() {
        let config = Config {
            request_timeout_secs: Some(15),
            upload_timeout_secs: Some(600),
            api_token: Some("secret".to_string()),
            ..Config::new()
        };
        let settings = config.transport_settings();
        assert_eq!(settings.request_timeout, Duration::from_secs(15));
        assert_eq!(settings.upload_timeout, Duration::from_secs(600));
        assert_eq!(settings.api_token.as_deref(), Some("secret"));
        assert_eq!(settings.connect_timeout, TransportSettings::default().connect_timeout);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
