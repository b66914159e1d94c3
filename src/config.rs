//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! when it exists, then applies `LFT_DB_PATH` and `LFT_LOG_LEVEL` env
//! overrides. A missing file yields the defaults below.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file (already expanded, no `~`).
    pub db_path: PathBuf,
    pub log_level: String,
    /// Tag types of which a file may carry at most one tag.
    pub exclusive_types: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: expand_home(&default_db_path()),
            log_level: default_log_level(),
            exclusive_types: default_exclusive_types(),
        }
    }
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    store: RawStore,
    #[serde(default)]
    tags: RawTags,
}

#[derive(Deserialize)]
struct RawStore {
    #[serde(default = "default_db_path")]
    db_path: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawStore {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Deserialize)]
struct RawTags {
    /// Defaults to `["rating"]`; an empty list disables exclusivity.
    #[serde(default = "default_exclusive_types")]
    exclusive_types: Vec<String>,
}

impl Default for RawTags {
    fn default() -> Self {
        Self {
            exclusive_types: default_exclusive_types(),
        }
    }
}

fn default_db_path() -> String {
    "data/tags.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_exclusive_types() -> Vec<String> {
    vec![crate::groups::RATING_TYPE.to_string()]
}

/// Load config from `config/default.toml`, then apply env-var overrides.
pub fn load() -> Result<Config, AppError> {
    let db_override = env::var("LFT_DB_PATH").ok();
    let log_level_override = env::var("LFT_LOG_LEVEL").ok();
    load_from(
        Path::new("config/default.toml"),
        db_override.as_deref(),
        log_level_override.as_deref(),
    )
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    db_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let parsed: RawConfig = if path.exists() {
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?
    } else {
        RawConfig::default()
    };

    let db_path = expand_home(db_override.unwrap_or(&parsed.store.db_path));
    let log_level = log_level_override
        .unwrap_or(&parsed.store.log_level)
        .to_string();

    Ok(Config {
        db_path,
        log_level,
        exclusive_types: parsed.tags.exclusive_types,
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
