use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use treepull_app::App;
use treepull_core::command_runner::{CommandOutput, CommandRunner};
use treepull_core::config::TreepullConfig;
use treepull_core::history::{HistoryStore, history_path};
use treepull_core::snapshot::{RepoIdentity, RepositorySnapshot};
use treepull_core::transport::{PullOutcome, RepoTransport};
use treepull_core::tree::FileEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Branches { url: String },
    Snapshot { url: String, branch: String },
    Pull { paths: Vec<String> },
    History,
}

#[derive(Default)]
pub struct QueueTransport {
    branches: Mutex<VecDeque<anyhow::Result<Vec<String>>>>,
    snapshots: Mutex<VecDeque<anyhow::Result<RepositorySnapshot>>>,
    pulls: Mutex<VecDeque<anyhow::Result<PullOutcome>>>,
    calls: Mutex<Vec<Call>>,
}

impl QueueTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branches(self, result: anyhow::Result<Vec<String>>) -> Self {
        self.branches.lock().expect("branches lock").push_back(result);
        self
    }

    pub fn with_snapshot(self, result: anyhow::Result<RepositorySnapshot>) -> Self {
        self.snapshots
            .lock()
            .expect("snapshots lock")
            .push_back(result);
        self
    }

    pub fn with_pull(self, result: anyhow::Result<PullOutcome>) -> Self {
        self.pulls.lock().expect("pulls lock").push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

impl RepoTransport for QueueTransport {
    fn list_branches(&self, url: &str) -> anyhow::Result<Vec<String>> {
        self.record(Call::Branches {
            url: url.to_string(),
        });
        self.branches
            .lock()
            .expect("branches lock")
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("missing scripted branches")))
    }

    fn fetch_snapshot(&self, url: &str, branch: &str) -> anyhow::Result<RepositorySnapshot> {
        self.record(Call::Snapshot {
            url: url.to_string(),
            branch: branch.to_string(),
        });
        self.snapshots
            .lock()
            .expect("snapshots lock")
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("missing scripted snapshot")))
    }

    fn pull_files(&self, files: &[FileEntry]) -> anyhow::Result<PullOutcome> {
        self.record(Call::Pull {
            paths: files.iter().map(|file| file.path.clone()).collect(),
        });
        self.pulls
            .lock()
            .expect("pulls lock")
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("missing scripted pull")))
    }

    fn list_history(&self) -> anyhow::Result<Vec<RepositorySnapshot>> {
        self.record(Call::History);
        Ok(Vec::new())
    }
}

/// Doctor checks shell out; nothing else in the app layer does.
pub struct NoRunner;

impl CommandRunner for NoRunner {
    fn run(
        &self,
        program: &str,
        _args: &[&str],
        _cwd: Option<&Path>,
    ) -> anyhow::Result<CommandOutput> {
        Err(anyhow!("unexpected command: {program}"))
    }
}

pub fn snapshot(url: &str, paths: &[&str]) -> RepositorySnapshot {
    RepositorySnapshot {
        branch: Some("main".to_string()),
        fetched_at: "2026-02-25T10:00:00Z".to_string(),
        truncated: false,
        identity: RepoIdentity {
            name: "repo".to_string(),
            full_name: "octo/repo".to_string(),
            description: None,
            stars: None,
            forks: None,
            language: None,
            owner_avatar: None,
            html_url: url.to_string(),
        },
        contents: paths
            .iter()
            .map(|path| FileEntry::file(path, Some(format!("key:{path}"))))
            .collect(),
    }
}

pub fn app_with(
    home: &Path,
    transport: Arc<QueueTransport>,
) -> (App, Arc<HistoryStore>) {
    let history = Arc::new(HistoryStore::new(history_path(home), 10));
    let app = App::with_parts(
        TreepullConfig::default(),
        Arc::new(NoRunner),
        transport,
        Arc::clone(&history),
    );
    (app, history)
}
