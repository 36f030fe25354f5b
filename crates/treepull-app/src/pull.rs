use std::collections::BTreeSet;

use anyhow::{Result, bail};
use thiserror::Error;
use treepull_core::lifecycle::Notice;

use crate::App;
use crate::session::load_repo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullSelection {
    All,
    Paths(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub url: String,
    pub branch: Option<String>,
    pub selection: PullSelection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullResult {
    pub url: String,
    pub branch: String,
    pub requested: usize,
    pub created_files: Vec<String>,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Error)]
pub enum PullPathError {
    #[error("'{path}' is not a file in {full_name}")]
    UnknownPath { path: String, full_name: String },
}

impl App {
    pub fn pull(&self, request: PullRequest) -> Result<PullResult> {
        let mut loaded = load_repo(self, &request.url, request.branch.as_deref())?;
        let full_name = loaded.locator.full_name();
        let controller = &mut loaded.controller;

        match &request.selection {
            PullSelection::All => controller.state_mut().select_all(),
            PullSelection::Paths(paths) => {
                let unique: BTreeSet<&str> = paths
                    .iter()
                    .map(|path| path.trim().trim_matches('/'))
                    .collect();
                for path in unique {
                    if !controller.state_mut().toggle(path, true) {
                        return Err(PullPathError::UnknownPath {
                            path: path.to_string(),
                            full_name: full_name.clone(),
                        }
                        .into());
                    }
                }
            }
        }

        let requested = controller.state().selection().len();
        controller.request_pull()?;
        controller.wait_idle();

        let state = controller.state();
        if let Some(error) = state.error() {
            bail!("pull from {full_name} failed: {error}");
        }

        let created_files = state.last_created_files().to_vec();
        let branch = state.selected_branch().to_string();
        let notices = controller.state_mut().take_notices();

        Ok(PullResult {
            url: loaded.locator.canonical_url(),
            branch,
            requested,
            created_files,
            notices,
        })
    }
}
