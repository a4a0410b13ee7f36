use crate::error::{Result, SyncError};
use serde::Deserialize;
use std::env;
use std::fs;
use std::time::Duration;
use tracing::debug;

pub const CONFIG_PATH_VAR: &str = "RECIPE_SYNC_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub trello: TrelloConfig,
    pub database: DatabaseConfig,
    pub refresh: RefreshConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8001 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrelloConfig {
    pub api_root: String,
    pub board_id: String,
    /// Label marking a recipe as public; search results are limited to it.
    pub published_label_id: String,
    pub key: Option<String>,
    pub token: Option<String>,
}

impl Default for TrelloConfig {
    fn default() -> Self {
        Self {
            api_root: "https://api.trello.com/1".to_string(),
            board_id: "5820f9c22043447d3f4fa857".to_string(),
            published_label_id: "5f55960c17f08e1fde18785e".to_string(),
            key: None,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// libSQL URL; the in-memory store is used when unset.
    pub url: Option<String>,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Pause between per-recipe detail fetches.
    pub detail_delay_ms: u64,
    /// Archives older than this many days are pruned.
    pub retention_days: i64,
    /// Scheduled refresh period for `serve`; 0 turns it off.
    pub interval_hours: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            detail_delay_ms: 120,
            retention_days: 30,
            interval_hours: 0,
        }
    }
}

impl RefreshConfig {
    pub fn detail_delay(&self) -> Duration {
        Duration::from_millis(self.detail_delay_ms)
    }

    pub fn interval(&self) -> Option<Duration> {
        (self.interval_hours > 0).then(|| Duration::from_secs(self.interval_hours * 60 * 60))
    }
}

impl Config {
    /// Reads `config.toml` (or the file named by `RECIPE_SYNC_CONFIG`), then
    /// applies environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let config_content = fs::read_to_string(&config_path)
            .map_err(|e| SyncError::Config(format!("Failed to read config file '{}': {}", config_path, e)))?;

        let mut config = Self::from_toml_str(&config_content)?;
        config.apply_env_overrides(|key| env::var(key).ok())?;
        debug!("Loaded configuration from {}", config_path);
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Secrets and deployment knobs come from the environment when set.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| SyncError::Config(format!("Invalid PORT value {port:?}: {e}")))?;
        }
        if let Some(key) = lookup("TRELLO_KEY") {
            self.trello.key = Some(key);
        }
        if let Some(token) = lookup("TRELLO_TOKEN") {
            self.trello.token = Some(token);
        }
        if let Some(url) = lookup("LIBSQL_URL") {
            self.database.url = Some(url);
        }
        if let Some(token) = lookup("LIBSQL_AUTH_TOKEN") {
            self.database.auth_token = Some(token);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.trello.board_id.trim().is_empty() {
            return Err(SyncError::Config("trello.board_id must not be empty".into()));
        }
        if !(0..=MAX_RETENTION_DAYS).contains(&self.refresh.retention_days) {
            return Err(SyncError::Config(format!(
                "refresh.retention_days must be between 0 and {MAX_RETENTION_DAYS}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.trello.api_root, "https://api.trello.com/1");
        assert_eq!(config.refresh.detail_delay(), Duration::from_millis(120));
        assert_eq!(config.refresh.interval(), None);
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml_str(
            r#"
            [trello]
            board_id = "board"

            [refresh]
            retention_days = 7
            interval_hours = 24
            "#,
        )
        .unwrap();
        assert_eq!(config.trello.board_id, "board");
        assert_eq!(config.refresh.retention_days, 7);
        assert_eq!(config.refresh.interval(), Some(Duration::from_secs(24 * 3600)));
    }

    #[test]
    fn rejects_blank_board() {
        assert!(Config::from_toml_str("[trello]\nboard_id = \" \"").is_err());
    }

    #[test]
    fn rejects_retention_out_of_range() {
        assert!(Config::from_toml_str("[refresh]\nretention_days = -1").is_err());
        assert!(Config::from_toml_str("[refresh]\nretention_days = 100000000").is_err());
        assert!(Config::from_toml_str("[refresh]\nretention_days = 36500").is_ok());
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [("PORT", "9000"), ("TRELLO_KEY", "k"), ("LIBSQL_URL", "libsql://x")].into();
        let mut config = Config::default();
        config
            .apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.trello.key.as_deref(), Some("k"));
        assert_eq!(config.database.url.as_deref(), Some("libsql://x"));

        let mut config = Config::default();
        assert!(config.apply_env_overrides(|k| (k == "PORT").then(|| "nope".to_string())).is_err());
    }
}
