use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command_adapter;
use crate::command_runner::{CommandOutput, CommandRunner};
use crate::config::PullLayout;
use crate::history::HistoryStore;
use crate::names::{RepoLocator, parse_repo_url};
use crate::placement::{PlacementError, place};
use crate::snapshot::{RepoIdentity, RepositorySnapshot};
use crate::time::now_utc_rfc3339;
use crate::transport::{PullOutcome, RepoTransport};
use crate::tree::{EntryKind, FetchLimits, FileEntry, ListedEntry, build_tree};

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git command failed: git {command} (exit {status}) {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("failed to execute git command: {0}")]
    Execute(String),
    #[error("failed to parse git output: {0}")]
    Parse(String),
    #[error("repository '{url}' was not found or is not accessible")]
    RepositoryNotFound { url: String },
    #[error("branch '{branch}' does not exist on the remote")]
    BranchNotFound { branch: String },
    #[error("failed to prepare cache at {path}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum PullError {
    #[error("file '{path}' has a malformed download reference '{reference}'")]
    BadReference { path: String, reference: String },
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: GitError,
    },
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Branch names advertised by `remote`, in the order git reports them.
pub fn list_remote_branches(
    remote: &str,
    runner: &dyn CommandRunner,
) -> Result<Vec<String>, GitError> {
    let remote = remote_arg(remote)?;
    let output = run_git(runner, &["ls-remote", "--heads", remote], None)?;
    if output.status_code != 0 {
        if looks_like_missing_repository(&output.stderr) {
            return Err(GitError::RepositoryNotFound {
                url: remote.to_string(),
            });
        }
        return Err(command_failed(&["ls-remote", "--heads", remote], output));
    }

    Ok(parse_head_refs(&output.stdout_lossy()))
}

/// Creates the bare cache repository unless it already exists.
pub fn ensure_cache_repo(repo_dir: &Path, runner: &dyn CommandRunner) -> Result<(), GitError> {
    if repo_dir.join("HEAD").is_file() {
        return Ok(());
    }

    fs::create_dir_all(repo_dir).map_err(|source| GitError::Cache {
        path: repo_dir.to_path_buf(),
        source,
    })?;

    let target = utf8_path(repo_dir, "cache path is not valid UTF-8")?;
    run_git_checked(runner, &["init", "--bare", "--quiet", target], None)?;
    Ok(())
}

/// Shallow-fetches one branch into `FETCH_HEAD` of the cache repository.
pub fn fetch_branch(
    repo_dir: &Path,
    remote: &str,
    branch: &str,
    runner: &dyn CommandRunner,
) -> Result<(), GitError> {
    let remote = remote_arg(remote)?;
    let branch = branch.trim();
    if branch.is_empty() || branch.starts_with('-') {
        return Err(GitError::Parse(format!("invalid branch name '{branch}'")));
    }

    let args = [
        "fetch",
        "--depth",
        "1",
        "--no-tags",
        "--quiet",
        remote,
        branch,
    ];
    let output = run_git(runner, &args, Some(repo_dir))?;
    if output.status_code == 0 {
        return Ok(());
    }

    if looks_like_missing_ref(&output.stderr) {
        return Err(GitError::BranchNotFound {
            branch: branch.to_string(),
        });
    }
    if looks_like_missing_repository(&output.stderr) {
        return Err(GitError::RepositoryNotFound {
            url: remote.to_string(),
        });
    }

    Err(command_failed(&args, output))
}

/// Pre-order listing of `FETCH_HEAD`; blobs carry `<cache_key>:<oid>` as
/// their download reference. Submodule entries are skipped.
pub fn list_fetched_tree(
    repo_dir: &Path,
    cache_key: &str,
    runner: &dyn CommandRunner,
) -> Result<Vec<ListedEntry>, GitError> {
    let output = run_git_checked(
        runner,
        &["ls-tree", "-r", "-t", "-z", "--full-tree", "FETCH_HEAD"],
        Some(repo_dir),
    )?;

    parse_ls_tree(&output.stdout, cache_key)
}

pub fn read_blob(
    repo_dir: &Path,
    oid: &str,
    runner: &dyn CommandRunner,
) -> Result<Vec<u8>, GitError> {
    if oid.is_empty() || !oid.chars().all(|character| character.is_ascii_hexdigit()) {
        return Err(GitError::Parse(format!("invalid object id '{oid}'")));
    }

    let output = run_git_checked(runner, &["cat-file", "blob", oid], Some(repo_dir))?;
    Ok(output.stdout)
}

fn parse_head_refs(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| line.split_once('\t'))
        .filter_map(|(_, reference)| reference.trim().strip_prefix("refs/heads/"))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_ls_tree(raw: &[u8], cache_key: &str) -> Result<Vec<ListedEntry>, GitError> {
    let mut entries = Vec::new();

    for record in raw.split(|byte| *byte == 0).filter(|record| !record.is_empty()) {
        let record = String::from_utf8_lossy(record);
        let (meta, path) = record
            .split_once('\t')
            .ok_or_else(|| GitError::Parse(format!("malformed ls-tree record '{record}'")))?;

        let mut fields = meta.split(' ');
        let (Some(_mode), Some(object_type), Some(oid)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(GitError::Parse(format!(
                "malformed ls-tree metadata '{meta}'"
            )));
        };

        let entry = match object_type {
            "tree" => ListedEntry {
                path: path.to_string(),
                kind: EntryKind::Directory,
                download_ref: None,
            },
            "blob" => ListedEntry {
                path: path.to_string(),
                kind: EntryKind::File,
                download_ref: Some(format!("{cache_key}:{oid}")),
            },
            _ => continue,
        };
        entries.push(entry);
    }

    Ok(entries)
}

fn split_download_ref(reference: &str) -> Option<(&str, &str)> {
    let (key, oid) = reference.rsplit_once(':')?;
    (!key.is_empty() && !oid.is_empty() && !key.contains(['/', '\\']) && key != "..")
        .then_some((key, oid))
}

fn identity_for(locator: &RepoLocator) -> RepoIdentity {
    RepoIdentity {
        name: locator.repo.clone(),
        full_name: locator.full_name(),
        description: None,
        stars: None,
        forks: None,
        language: None,
        owner_avatar: None,
        html_url: locator.canonical_url(),
    }
}

/// [`RepoTransport`] backed by the `git` CLI and a local cache of shallow
/// bare clones.
pub struct GitTransport {
    runner: Arc<dyn CommandRunner>,
    cache_root: PathBuf,
    history: Arc<HistoryStore>,
    limits: FetchLimits,
    destination: PathBuf,
    layout: PullLayout,
    fetch_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GitTransport {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        cache_root: PathBuf,
        history: Arc<HistoryStore>,
        limits: FetchLimits,
    ) -> Self {
        Self {
            runner,
            cache_root,
            history,
            limits,
            destination: PathBuf::from("pulled"),
            layout: PullLayout::Mirror,
            fetch_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_destination(mut self, destination: PathBuf, layout: PullLayout) -> Self {
        self.destination = destination;
        self.layout = layout;
        self
    }

    fn repo_lock(&self, cache_key: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .fetch_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(cache_key.to_string()).or_default())
    }

    fn fetch_listing(
        &self,
        locator: &RepoLocator,
        branch: &str,
    ) -> Result<Vec<ListedEntry>, GitError> {
        let cache_key = locator.cache_key();
        let repo_dir = self.cache_root.join(&cache_key);

        // FETCH_HEAD is shared per cache repository.
        let lock = self.repo_lock(&cache_key);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        ensure_cache_repo(&repo_dir, self.runner.as_ref())?;
        fetch_branch(&repo_dir, &locator.remote, branch, self.runner.as_ref())?;
        list_fetched_tree(&repo_dir, &cache_key, self.runner.as_ref())
    }

    fn materialize(&self, files: &[FileEntry]) -> Result<Vec<String>, PullError> {
        let mut staged: Vec<(PathBuf, String)> = Vec::new();

        for file in files.iter().filter(|file| file.is_file()) {
            let Some(reference) = file.download_ref.as_deref() else {
                debug!(path = %file.path, "skipping file without download reference");
                continue;
            };
            let (cache_key, oid) =
                split_download_ref(reference).ok_or_else(|| PullError::BadReference {
                    path: file.path.clone(),
                    reference: reference.to_string(),
                })?;

            let bytes = read_blob(&self.cache_root.join(cache_key), oid, self.runner.as_ref())
                .map_err(|source| PullError::Read {
                    path: file.path.clone(),
                    source,
                })?;

            let Ok(text) = String::from_utf8(bytes) else {
                debug!(path = %file.path, "skipping binary file");
                continue;
            };

            let Some(relative) = place(&file.path, self.layout)? else {
                debug!(path = %file.path, layout = self.layout.as_str(), "no target for file");
                continue;
            };

            let target = self.destination.join(relative);
            staged.retain(|(existing, _)| *existing != target);
            staged.push((target, text));
        }

        staged.par_iter().try_for_each(|(target, text)| {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|source| PullError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(target, text).map_err(|source| PullError::Write {
                path: target.clone(),
                source,
            })
        })?;

        Ok(staged
            .into_iter()
            .map(|(target, _)| target.display().to_string())
            .collect())
    }
}

impl RepoTransport for GitTransport {
    fn list_branches(&self, url: &str) -> anyhow::Result<Vec<String>> {
        let locator = parse_repo_url(url)?;
        Ok(list_remote_branches(&locator.remote, self.runner.as_ref())?)
    }

    fn fetch_snapshot(&self, url: &str, branch: &str) -> anyhow::Result<RepositorySnapshot> {
        let locator = parse_repo_url(url)?;
        let listing = self
            .fetch_listing(&locator, branch)
            .with_context(|| format!("failed to fetch {} at '{branch}'", locator.full_name()))?;

        let built = build_tree(&listing, self.limits);
        if built.truncated {
            debug!(
                url,
                entries = built.entry_count,
                listed = listing.len(),
                "tree truncated by fetch limits"
            );
        }

        let snapshot = RepositorySnapshot {
            branch: Some(branch.trim().to_string()),
            fetched_at: now_utc_rfc3339().context("failed to format fetch timestamp")?,
            truncated: built.truncated,
            identity: identity_for(&locator),
            contents: built.roots,
        };

        if let Err(error) = self.history.record(&snapshot) {
            warn!(url = snapshot.url(), %error, "failed to record history entry");
        }

        Ok(snapshot)
    }

    fn pull_files(&self, files: &[FileEntry]) -> anyhow::Result<PullOutcome> {
        match self.materialize(files) {
            Ok(created) => {
                info!(
                    created = created.len(),
                    destination = %self.destination.display(),
                    "pull finished"
                );
                Ok(PullOutcome::created(created))
            }
            Err(error) => Ok(PullOutcome::failed(error.to_string())),
        }
    }

    fn list_history(&self) -> anyhow::Result<Vec<RepositorySnapshot>> {
        Ok(self.history.list())
    }
}

fn remote_arg(url: &str) -> Result<&str, GitError> {
    let trimmed = url.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(GitError::Parse(format!("invalid remote '{trimmed}'")));
    }
    Ok(trimmed)
}

fn looks_like_missing_ref(stderr: &str) -> bool {
    stderr.to_lowercase().contains("couldn't find remote ref")
}

fn looks_like_missing_repository(stderr: &str) -> bool {
    let normalized = stderr.to_lowercase();
    normalized.contains("repository not found")
        || normalized.contains("does not appear to be a git repository")
        || normalized.contains("could not read username")
}

fn utf8_path<'a>(path: &'a Path, message: &str) -> Result<&'a str, GitError> {
    path.to_str()
        .ok_or_else(|| GitError::Parse(message.to_string()))
}

fn command_failed(args: &[&str], output: CommandOutput) -> GitError {
    GitError::CommandFailed {
        command: args.join(" "),
        status: output.status_code,
        stderr: output.stderr.trim().to_string(),
    }
}

fn run_git_checked(
    runner: &dyn CommandRunner,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<CommandOutput, GitError> {
    let output = run_git(runner, args, cwd)?;
    command_adapter::ensure_success(args, output).map_err(|failure| GitError::CommandFailed {
        command: failure.command,
        status: failure.status,
        stderr: failure.stderr,
    })
}

fn run_git(
    runner: &dyn CommandRunner,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<CommandOutput, GitError> {
    command_adapter::run_program(runner, "git", args, cwd).map_err(GitError::Execute)
}
