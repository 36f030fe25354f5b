use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::snapshot::RepositorySnapshot;

const HISTORY_VERSION: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct HistoryFile {
    version: i64,
    #[serde(rename = "repo", default)]
    entries: Vec<RepositorySnapshot>,
}

impl Default for HistoryFile {
    fn default() -> Self {
        Self {
            version: HISTORY_VERSION,
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read history at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse history at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to write history at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize history: {0}")]
    Serialize(toml::ser::Error),
    #[error("invalid history schema: unsupported version (expected {HISTORY_VERSION}, found {found})")]
    UnsupportedVersion { found: i64 },
}

pub fn history_path(config_dir: &Path) -> PathBuf {
    config_dir.join("history.toml")
}

/// Most-recent-first list of fetched snapshots, one per repository URL.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    limit: usize,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: PathBuf, limit: usize) -> Self {
        Self {
            path,
            limit: limit.max(1),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<RepositorySnapshot>, HistoryError> {
        Ok(self.load_file()?.entries)
    }

    /// Like [`HistoryStore::load`], but an unreadable file is logged and read as empty.
    pub fn list(&self) -> Vec<RepositorySnapshot> {
        match self.load() {
            Ok(entries) => entries,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "history unreadable; treating as empty");
                Vec::new()
            }
        }
    }

    pub fn record(&self, snapshot: &RepositorySnapshot) -> Result<(), HistoryError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut entries = self.list();
        entries.retain(|entry| entry.url() != snapshot.url());
        entries.insert(0, snapshot.clone());
        entries.truncate(self.limit);

        self.write_file(&HistoryFile {
            version: HISTORY_VERSION,
            entries,
        })
    }

    pub fn remove(&self, url: &str) -> Result<Option<RepositorySnapshot>, HistoryError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut history = self.load_file()?;
        let Some(index) = history.entries.iter().position(|entry| entry.url() == url) else {
            return Ok(None);
        };

        let removed = history.entries.remove(index);
        self.write_file(&history)?;
        Ok(Some(removed))
    }

    fn load_file(&self) -> Result<HistoryFile, HistoryError> {
        if !self.path.exists() {
            return Ok(HistoryFile::default());
        }

        let raw = fs::read_to_string(&self.path).map_err(|source| HistoryError::Read {
            path: self.path.clone(),
            source,
        })?;

        let parsed: HistoryFile = toml::from_str(&raw).map_err(|source| HistoryError::Parse {
            path: self.path.clone(),
            source,
        })?;

        if parsed.version != HISTORY_VERSION {
            return Err(HistoryError::UnsupportedVersion {
                found: parsed.version,
            });
        }

        Ok(parsed)
    }

    fn write_file(&self, history: &HistoryFile) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| HistoryError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let serialized = toml::to_string(history).map_err(HistoryError::Serialize)?;
        let temp_path = self.path.with_extension("toml.tmp");

        fs::write(&temp_path, serialized).map_err(|source| HistoryError::Write {
            path: temp_path.clone(),
            source,
        })?;

        fs::rename(&temp_path, &self.path).map_err(|source| HistoryError::Write {
            path: self.path.clone(),
            source,
        })?;

        Ok(())
    }
}
