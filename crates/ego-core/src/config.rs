use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::quota::DEFAULT_WEEKLY_QUOTA;
use crate::settings::CustomizationSettings;
use crate::timing::LatencyWindow;
use crate::turn::{TurnTiming, DEFAULT_RESPONSE_TIMEOUT};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub default_model: Option<String>,
    pub customization: CustomizationSettings,
    pub weekly_quota: u32,
    pub thinking_delay_ms: LatencyWindow,
    pub response_delay_ms: LatencyWindow,
    pub response_timeout_secs: u64,
    pub voice_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            default_model: None,
            customization: CustomizationSettings::default(),
            weekly_quota: DEFAULT_WEEKLY_QUOTA,
            thinking_delay_ms: LatencyWindow::thinking(),
            response_delay_ms: LatencyWindow::response(),
            response_timeout_secs: DEFAULT_RESPONSE_TIMEOUT.as_secs(),
            voice_output: false,
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        tracing::info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        tracing::debug!(path = %path.display(), "config saved");
        Ok(())
    }

    pub fn turn_timing(&self) -> TurnTiming {
        TurnTiming {
            thinking: self.thinking_delay_ms,
            response_timeout: Duration::from_secs(self.response_timeout_secs.max(1)),
        }
    }

    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("ego"))
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Tone;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.weekly_quota, 7);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.default_model = Some("claude-3-opus".to_string());
        config.customization = config.customization.with_tone(Tone::Technical);
        config.weekly_quota = 20;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "weekly_quota": 3, "voice_output": true }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.weekly_quota, 3);
        assert!(config.voice_output);
        assert_eq!(config.response_delay_ms, LatencyWindow::response());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_turn_timing_from_config() {
        let mut config = Config::new();
        config.response_timeout_secs = 0;
        let timing = config.turn_timing();
        assert_eq!(timing.response_timeout, Duration::from_secs(1));
        assert_eq!(timing.thinking, LatencyWindow::thinking());
    }
}
