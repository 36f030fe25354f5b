use anyhow::{Context, Result};
use treepull_core::listing::{FileQuery, FileRow, SortState, build_rows};
use treepull_core::names::parse_repo_url;

use crate::App;
use crate::session::load_repo;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeRequest {
    pub url: String,
    pub branch: Option<String>,
    pub sort: SortState,
    pub query: FileQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeResult {
    pub url: String,
    pub full_name: String,
    pub branch: String,
    pub branches: Vec<String>,
    pub fetched_at: String,
    pub truncated: bool,
    pub total_files: usize,
    pub rows: Vec<FileRow>,
}

impl App {
    pub fn branches(&self, url: &str) -> Result<Vec<String>> {
        let locator = parse_repo_url(url)?;
        self.transport
            .list_branches(url)
            .with_context(|| format!("failed to list branches of {}", locator.full_name()))
    }

    pub fn tree(&self, request: TreeRequest) -> Result<TreeResult> {
        let loaded = load_repo(self, &request.url, request.branch.as_deref())?;
        let state = loaded.controller.state();
        let snapshot = state
            .snapshot()
            .context("snapshot disappeared after a successful fetch")?;

        Ok(TreeResult {
            url: loaded.locator.canonical_url(),
            full_name: loaded.locator.full_name(),
            branch: state.selected_branch().to_string(),
            branches: state.branches().to_vec(),
            fetched_at: snapshot.fetched_at.clone(),
            truncated: snapshot.truncated,
            total_files: snapshot.file_count(),
            rows: build_rows(&snapshot.contents, &request.query, request.sort),
        })
    }
}
