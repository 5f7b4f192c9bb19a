use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use wabot_types::ChannelConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
}

/// Hosted database connection config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Base URL of the realtime database (e.g. "https://myapp.firebaseio.com").
    #[serde(default)]
    pub url: String,
    /// Auth secret appended to every request (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

/// Prediction endpoint config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Full URL of the prediction endpoint.
    #[serde(default)]
    pub url: String,
}

/// Daily sweep timing config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Local hour of the daily sweep.
    #[serde(default = "default_hour")]
    pub hour: u32,
    /// Local minute of the daily sweep.
    #[serde(default = "default_minute")]
    pub minute: u32,
    /// Bot timezone as minutes east of UTC. Default is UTC+07:00 (Asia/Jakarta).
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    /// Reminders go out when a task has this many days or fewer left.
    #[serde(default = "default_reminder_window_days")]
    pub reminder_window_days: i64,
}

fn default_hour() -> u32 {
    18
}

fn default_minute() -> u32 {
    30
}

fn default_utc_offset_minutes() -> i32 {
    7 * 60
}

fn default_reminder_window_days() -> i64 {
    3
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            hour: default_hour(),
            minute: default_minute(),
            utc_offset_minutes: default_utc_offset_minutes(),
            reminder_window_days: default_reminder_window_days(),
        }
    }
}

/// Top-level wabot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WabotConfig {
    /// Hosted database connection.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Prediction endpoint.
    #[serde(default)]
    pub inference: InferenceConfig,
    /// Daily sweep timing.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Named channel configurations.
    #[serde(default)]
    pub channels: HashMap<String, ChannelConfig>,
}

/// Resolve the wabot config directory (~/.wabot/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".wabot"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.wabot/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path, falling back to defaults.
pub fn load_config() -> Result<WabotConfig, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path, falling back to defaults if not found.
///
/// `WABOT_DATABASE_URL` and `WABOT_DATABASE_AUTH` environment variables
/// override the file so the database secret can stay out of the config file.
pub fn load_config_from(path: &Path) -> Result<WabotConfig, ConfigError> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        json5::from_str(&content)?
    } else {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        WabotConfig::default()
    };

    if let Ok(url) = std::env::var("WABOT_DATABASE_URL") {
        config.database.url = url;
    }
    if let Ok(auth) = std::env::var("WABOT_DATABASE_AUTH") {
        config.database.auth = Some(auth);
    }

    Ok(config)
}

/// Ensure the config directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = config_dir()?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Save configuration to the default path.
pub fn save_config(config: &WabotConfig) -> Result<(), ConfigError> {
    let dir = ensure_config_dir()?;
    let path = dir.join("config.json5");
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Io(std::io::Error::other(e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WabotConfig::default();
        assert_eq!(config.scheduler.hour, 18);
        assert_eq!(config.scheduler.minute, 30);
        assert_eq!(config.scheduler.utc_offset_minutes, 420);
        assert_eq!(config.scheduler.reminder_window_days, 3);
        assert!(config.database.url.is_empty());
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_json5_parse() {
        let json5_str = r#"{
            database: { url: "https://myapp.firebaseio.com", auth: "secret" },
            inference: { url: "https://flowise.example.com/api/v1/prediction/abc" },
            scheduler: { hour: 20 },
        }"#;
        let config: WabotConfig = json5::from_str(json5_str).unwrap();
        assert_eq!(config.database.url, "https://myapp.firebaseio.com");
        assert_eq!(config.database.auth.as_deref(), Some("secret"));
        assert_eq!(config.scheduler.hour, 20);
        // unset fields keep their defaults
        assert_eq!(config.scheduler.minute, 30);
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_json5_parse_with_channels() {
        let json5_str = r#"{
            channels: {
                "wa-main": {
                    channel_type: "whatsapp",
                    enabled: true,
                    settings: { bridge_url: "http://127.0.0.1:8077", api_token: "tok" },
                }
            },
        }"#;
        let config: WabotConfig = json5::from_str(json5_str).unwrap();
        assert!(config.channels.contains_key("wa-main"));
        let ch = &config.channels["wa-main"];
        assert_eq!(ch.channel_type, "whatsapp");
        assert!(ch.enabled);
        assert_eq!(
            ch.settings["bridge_url"].as_str(),
            Some("http://127.0.0.1:8077")
        );
    }
}
