use anyhow::{Context, Result};
use thiserror::Error;
use treepull_core::names::parse_repo_url;
use treepull_core::snapshot::RepositorySnapshot;
use treepull_core::time::display_timestamp;

use crate::App;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub url: String,
    pub full_name: String,
    pub branch: String,
    pub fetched_at: String,
    pub file_count: usize,
    pub truncated: bool,
}

impl HistoryRow {
    fn from_snapshot(snapshot: &RepositorySnapshot) -> Self {
        Self {
            url: snapshot.url().to_string(),
            full_name: snapshot.identity.full_name.clone(),
            branch: snapshot.branch.clone().unwrap_or_else(|| "-".to_string()),
            fetched_at: display_timestamp(&snapshot.fetched_at),
            file_count: snapshot.file_count(),
            truncated: snapshot.truncated,
        }
    }
}

#[derive(Debug, Error)]
pub enum ForgetError {
    #[error("no history entry for '{url}'")]
    NotFound { url: String },
}

impl App {
    /// Most recent first. An unreadable history file lists as empty.
    pub fn history(&self) -> Result<Vec<HistoryRow>> {
        Ok(self
            .history
            .list()
            .iter()
            .map(HistoryRow::from_snapshot)
            .collect())
    }

    pub fn forget(&self, url: &str) -> Result<HistoryRow> {
        let key = parse_repo_url(url)
            .map(|locator| locator.canonical_url())
            .unwrap_or_else(|_| url.trim().to_string());

        let removed = self.history.remove(&key).with_context(|| {
            format!(
                "failed to update history at {}",
                self.history.path().display()
            )
        })?;

        removed
            .as_ref()
            .map(HistoryRow::from_snapshot)
            .ok_or_else(|| ForgetError::NotFound { url: key }.into())
    }
}
