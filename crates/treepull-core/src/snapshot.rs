use serde::{Deserialize, Serialize};

use crate::tree::{FileEntry, flatten};

/// Descriptive repository fields carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoIdentity {
    pub name: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_avatar: Option<String>,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub fetched_at: String,
    #[serde(default)]
    pub truncated: bool,
    pub identity: RepoIdentity,
    #[serde(default)]
    pub contents: Vec<FileEntry>,
}

impl RepositorySnapshot {
    pub fn url(&self) -> &str {
        &self.identity.html_url
    }

    pub fn files(&self) -> Vec<&FileEntry> {
        flatten(&self.contents)
    }

    pub fn file_count(&self) -> usize {
        self.files().len()
    }
}
