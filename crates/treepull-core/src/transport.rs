use crate::snapshot::RepositorySnapshot;
use crate::tree::FileEntry;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PullOutcome {
    pub success: bool,
    pub created_files: Vec<String>,
    pub error: Option<String>,
}

impl PullOutcome {
    pub fn created(created_files: Vec<String>) -> Self {
        Self {
            success: true,
            created_files,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            created_files: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// The four request/response exchanges the engine needs from a remote source.
/// Calls block; the controller runs them off the caller's thread.
pub trait RepoTransport: Send + Sync {
    fn list_branches(&self, url: &str) -> anyhow::Result<Vec<String>>;

    fn fetch_snapshot(&self, url: &str, branch: &str) -> anyhow::Result<RepositorySnapshot>;

    fn pull_files(&self, files: &[FileEntry]) -> anyhow::Result<PullOutcome>;

    fn list_history(&self) -> anyhow::Result<Vec<RepositorySnapshot>>;
}
