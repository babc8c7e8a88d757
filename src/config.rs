//! Configuration loading from TOML.
//!
//! Reads `config.toml` (or the path in `HORSEDGE_CONFIG`) and deserializes
//! into strongly-typed structs. Every section has defaults so a partial file
//! is enough.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::types::{Bookmaker, BookmakerSet, DEFAULT_USER};

/// Environment variable that overrides the config file path.
pub const CONFIG_PATH_ENV: &str = "HORSEDGE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub bookmakers: BookmakersConfig,
    pub edge: EdgeSettings,
    pub settlement: SettlementConfig,
    pub user: UserConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://horsedge.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BookmakersConfig {
    /// Default selection when a request names no bookmakers.
    pub enabled: Vec<String>,
}

impl Default for BookmakersConfig {
    fn default() -> Self {
        Self {
            enabled: BookmakerSet::all().ids(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EdgeSettings {
    /// Threshold used when neither the request nor the user sets one.
    pub default_min_edge: f64,
    /// Threshold behind the race signals view.
    pub recommend_edge: f64,
}

impl Default for EdgeSettings {
    fn default() -> Self {
        Self {
            default_min_edge: 1.0,
            recommend_edge: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SettlementConfig {
    /// Run a settlement pass before serving tracked tips and analytics.
    pub settle_on_read: bool,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            settle_on_read: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UserConfig {
    pub default_user: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            default_user: DEFAULT_USER.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Load from `HORSEDGE_CONFIG`, falling back to `config.toml`.
    pub fn load_default() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(&path)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.enabled_books()?;
        if !self.edge.default_min_edge.is_finite() || !self.edge.recommend_edge.is_finite() {
            anyhow::bail!("Edge thresholds must be finite numbers");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }
        if self.user.default_user.trim().is_empty() {
            anyhow::bail!("user.default_user must not be empty");
        }
        Ok(())
    }

    /// The configured default bookmaker selection.
    pub fn enabled_books(&self) -> Result<BookmakerSet> {
        let parsed = self
            .bookmakers
            .enabled
            .iter()
            .map(|name| name.parse::<Bookmaker>())
            .collect::<Result<Vec<_>, _>>()
            .context("bookmakers.enabled")?;
        BookmakerSet::new(parsed).context("bookmakers.enabled")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let cfg = AppConfig::from_toml(
            r#"
            [server]
            enabled = true
            host = "0.0.0.0"
            port = 9000

            [database]
            url = "sqlite::memory:"
            max_connections = 1

            [bookmakers]
            enabled = ["tab", "sportsbet"]

            [edge]
            default_min_edge = 2.5
            recommend_edge = 5.0

            [settlement]
            settle_on_read = false

            [user]
            default_user = "punter"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.bind_addr(), "0.0.0.0:9000");
        assert_eq!(cfg.database.max_connections, 1);
        assert_eq!(cfg.enabled_books().unwrap().ids(), vec!["sportsbet", "tab"]);
        assert_eq!(cfg.edge.recommend_edge, 5.0);
        assert!(!cfg.settlement.settle_on_read);
        assert_eq!(cfg.user.default_user, "punter");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.enabled_books().unwrap().len(), Bookmaker::ALL.len());
        assert_eq!(cfg.user.default_user, "demo");
        assert!(cfg.settlement.settle_on_read);
    }

    #[test]
    fn test_unknown_bookmaker_rejected() {
        let err = AppConfig::from_toml("[bookmakers]\nenabled = [\"tab\", \"betfair\"]\n")
            .unwrap_err();
        assert!(format!("{err:#}").contains("Unknown bookmaker"));
    }

    #[test]
    fn test_empty_bookmaker_list_rejected() {
        assert!(AppConfig::from_toml("[bookmakers]\nenabled = []\n").is_err());
    }

    #[test]
    fn test_repo_config_file_is_valid() {
        let cfg = AppConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml")).unwrap();
        assert!(cfg.server.enabled);
    }
}
