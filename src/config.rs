use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::lifecycle::DEFAULT_REVIEW_DAYS;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub db: DbConfig,
    pub review: ReviewConfig,
    pub server: ServerConfig,
    pub import: ImportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            review: ReviewConfig::default(),
            server: ServerConfig::default(),
            import: ImportConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/kb/knowledge.db"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReviewConfig {
    /// Days after which a published article is flagged as needing review.
    pub window_days: i64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_REVIEW_DAYS,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8082".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ImportConfig {
    /// Default docs tree for `opskb import` when no path is given.
    pub root: PathBuf,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("docs"),
        }
    }
}

/// Loads configuration from a TOML file, falling back to defaults when the
/// file does not exist. The `KB_REVIEW_DAYS` environment variable overrides
/// the review window either way.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str::<Config>(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    if let Ok(raw) = std::env::var("KB_REVIEW_DAYS") {
        if let Ok(days) = raw.trim().parse::<i64>() {
            if days > 0 {
                config.review.window_days = days;
            }
        }
    }

    if config.review.window_days < 1 {
        anyhow::bail!("review.window_days must be >= 1");
    }
    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(config)
}
