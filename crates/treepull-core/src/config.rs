use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tree::FetchLimits;

const CONFIG_VERSION: u32 = 1;
const MAX_DEPTH_CEILING: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TreepullConfig {
    pub version: u32,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub pull: PullConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl Default for TreepullConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            fetch: FetchConfig::default(),
            pull: PullConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl TreepullConfig {
    pub fn fetch_limits(&self) -> FetchLimits {
        FetchLimits {
            max_entries: self.fetch.max_entries,
            max_depth: self.fetch.max_depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    pub default_branch: String,
    pub max_entries: usize,
    pub max_depth: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let limits = FetchLimits::default();
        Self {
            default_branch: "main".to_string(),
            max_entries: limits.max_entries,
            max_depth: limits.max_depth,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PullLayout {
    /// Keep the repository-relative path.
    #[default]
    Mirror,
    /// Place files into a `ui/` + `src/app/apis/` application skeleton.
    App,
}

impl PullLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mirror => "mirror",
            Self::App => "app",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PullConfig {
    pub destination: PathBuf,
    pub layout: PullLayout,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("pulled"),
            layout: PullLayout::Mirror,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { limit: 10 }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not resolve home directory for config path")]
    HomeDirectoryUnavailable,
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {message}")]
    Validation { message: String },
}

fn home_dir() -> Result<PathBuf, ConfigError> {
    let base_dirs = BaseDirs::new().ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(base_dirs.home_dir().to_path_buf())
}

pub fn resolve_config_dir() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?.join(".config").join("treepull"))
}

pub fn resolve_config_path() -> Result<PathBuf, ConfigError> {
    Ok(resolve_config_dir()?.join("config.toml"))
}

/// Shallow bare clones live here, one directory per repository.
pub fn resolve_cache_dir() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?.join(".cache").join("treepull").join("repos"))
}

pub fn load_config(path: &Path) -> Result<TreepullConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed: TreepullConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    validate_config(&parsed)?;
    Ok(parsed)
}

/// A missing file yields the defaults; a present file must be valid.
pub fn load_config_or_default(path: &Path) -> Result<TreepullConfig, ConfigError> {
    if !path.exists() {
        return Ok(TreepullConfig::default());
    }

    load_config(path)
}

pub fn validate_config(config: &TreepullConfig) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(validation(format!("version must be {CONFIG_VERSION}")));
    }

    if config.fetch.default_branch.trim().is_empty() {
        return Err(validation("fetch.default_branch must be non-empty"));
    }

    if config.fetch.max_entries == 0 {
        return Err(validation("fetch.max_entries must be at least 1"));
    }

    if config.fetch.max_depth > MAX_DEPTH_CEILING {
        return Err(validation(format!(
            "fetch.max_depth must be at most {MAX_DEPTH_CEILING}"
        )));
    }

    if config.pull.destination.as_os_str().is_empty() {
        return Err(validation("pull.destination must be non-empty"));
    }

    if config.history.limit == 0 {
        return Err(validation("history.limit must be at least 1"));
    }

    Ok(())
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}
