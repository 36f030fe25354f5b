use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, warn};

use crate::selection::SelectionSet;
use crate::snapshot::RepositorySnapshot;
use crate::transport::PullOutcome;
use crate::tree::{FileEntry, flatten};

pub type RequestToken = u64;

const FETCH_FAILED_FALLBACK: &str = "Failed to fetch repository";
const PULL_FAILED_FALLBACK: &str = "Failed to pull files";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Branches,
    Snapshot,
    Pull,
    History,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Branches => "branches",
            Self::Snapshot => "snapshot",
            Self::Pull => "pull",
            Self::History => "history",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Transient, user-facing notification. Notices are queued until drained and
/// never alter the lifecycle fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PullRejected {
    #[error("no repository is loaded; fetch a repository before pulling")]
    NoSnapshot,
    #[error("no files are selected; select at least one file to pull")]
    EmptySelection,
}

/// Everything a pull request carries: its token and the selected file entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullTicket {
    pub token: RequestToken,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ActiveTokens {
    branches: Option<RequestToken>,
    snapshot: Option<RequestToken>,
    pull: Option<RequestToken>,
    history: Option<RequestToken>,
}

impl ActiveTokens {
    fn slot(&mut self, operation: Operation) -> &mut Option<RequestToken> {
        match operation {
            Operation::Branches => &mut self.branches,
            Operation::Snapshot => &mut self.snapshot,
            Operation::Pull => &mut self.pull,
            Operation::History => &mut self.history,
        }
    }
}

/// Shared application state for one browsing session.
///
/// Each `begin_*` call issues a fresh token and makes it the only token whose
/// completion will be applied for that operation; completions carrying any
/// other token are discarded, so a slow stale request can never overwrite the
/// result of a newer one.
#[derive(Debug, Clone)]
pub struct RepoState {
    url: Option<String>,
    default_branch: String,
    branches: Vec<String>,
    selected_branch: String,
    snapshot: Option<RepositorySnapshot>,
    selection: SelectionSet,
    is_loading: bool,
    is_pulling: bool,
    error: Option<String>,
    history: Vec<RepositorySnapshot>,
    last_created_files: Vec<String>,
    notices: VecDeque<Notice>,
    next_token: RequestToken,
    active: ActiveTokens,
}

impl RepoState {
    pub fn new(default_branch: &str) -> Self {
        Self {
            url: None,
            default_branch: default_branch.to_string(),
            branches: Vec::new(),
            selected_branch: default_branch.to_string(),
            snapshot: None,
            selection: SelectionSet::new(),
            is_loading: false,
            is_pulling: false,
            error: None,
            history: Vec::new(),
            last_created_files: Vec::new(),
            notices: VecDeque::new(),
            next_token: 1,
            active: ActiveTokens::default(),
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    pub fn selected_branch(&self) -> &str {
        &self.selected_branch
    }

    pub fn snapshot(&self) -> Option<&RepositorySnapshot> {
        self.snapshot.as_ref()
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_pulling(&self) -> bool {
        self.is_pulling
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn history(&self) -> &[RepositorySnapshot] {
        &self.history
    }

    pub fn last_created_files(&self) -> &[String] {
        &self.last_created_files
    }

    pub fn is_active(&self, operation: Operation, token: RequestToken) -> bool {
        let mut active = self.active;
        *active.slot(operation) == Some(token)
    }

    pub fn has_pending(&self, operation: Operation) -> bool {
        let mut active = self.active;
        active.slot(operation).is_some()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    pub fn select_branch(&mut self, branch: &str) {
        self.selected_branch = branch.trim().to_string();
    }

    pub fn begin_branch_discovery(&mut self, url: &str) -> RequestToken {
        let token = self.issue(Operation::Branches);
        debug!(token, url, "branch discovery started");
        token
    }

    /// Failures are logged and swallowed: branches reset to empty and the
    /// current branch choice is kept.
    pub fn complete_branch_discovery(
        &mut self,
        token: RequestToken,
        result: Result<Vec<String>, String>,
    ) -> bool {
        if !self.settle(Operation::Branches, token) {
            return false;
        }

        match result {
            Ok(branches) => {
                if let Some(branch) = self.discovered_branch(&branches) {
                    self.selected_branch = branch;
                }
                self.branches = branches;
            }
            Err(message) => {
                warn!(token, error = %message, "branch discovery failed");
                self.branches.clear();
            }
        }

        true
    }

    pub fn begin_fetch(&mut self, url: &str) -> RequestToken {
        let token = self.issue(Operation::Snapshot);
        self.url = Some(url.to_string());
        self.is_loading = true;
        self.error = None;
        debug!(token, url, branch = %self.selected_branch, "snapshot fetch started");
        token
    }

    /// On failure the previous snapshot, if any, stays in place.
    pub fn complete_fetch(
        &mut self,
        token: RequestToken,
        result: Result<RepositorySnapshot, String>,
    ) -> bool {
        if !self.settle(Operation::Snapshot, token) {
            return false;
        }

        self.is_loading = false;
        match result {
            Ok(snapshot) => self.replace_snapshot(snapshot),
            Err(message) => {
                self.error = Some(non_empty_or(message, FETCH_FAILED_FALLBACK));
            }
        }

        true
    }

    /// Preconditions are checked before anything is issued; a rejection only
    /// queues a notice.
    pub fn begin_pull(&mut self) -> Result<PullTicket, PullRejected> {
        let rejection = match &self.snapshot {
            None => Some(PullRejected::NoSnapshot),
            Some(_) if self.selection.is_empty() => Some(PullRejected::EmptySelection),
            Some(_) => None,
        };

        if let Some(rejection) = rejection {
            self.notices
                .push_back(Notice::new(NoticeLevel::Warning, rejection.to_string()));
            return Err(rejection);
        }

        let files = self.selected_files();
        let token = self.issue(Operation::Pull);
        self.is_pulling = true;
        self.error = None;
        debug!(token, files = files.len(), "pull started");

        Ok(PullTicket { token, files })
    }

    pub fn complete_pull(
        &mut self,
        token: RequestToken,
        result: Result<PullOutcome, String>,
    ) -> bool {
        if !self.settle(Operation::Pull, token) {
            return false;
        }

        self.is_pulling = false;
        match result {
            Ok(outcome) if outcome.success => {
                let count = outcome.created_files.len();
                self.last_created_files = outcome.created_files;
                if count == 0 {
                    self.notices.push_back(Notice::new(
                        NoticeLevel::Warning,
                        "Pull finished but no files were created",
                    ));
                } else {
                    self.notices.push_back(Notice::new(
                        NoticeLevel::Info,
                        format!("Pulled {count} file(s)"),
                    ));
                }
            }
            Ok(outcome) => self.fail_pull(outcome.error.unwrap_or_default()),
            Err(message) => self.fail_pull(message),
        }

        true
    }

    pub fn begin_history_refresh(&mut self) -> RequestToken {
        self.issue(Operation::History)
    }

    pub fn complete_history_refresh(
        &mut self,
        token: RequestToken,
        result: Result<Vec<RepositorySnapshot>, String>,
    ) -> bool {
        if !self.settle(Operation::History, token) {
            return false;
        }

        match result {
            Ok(history) => self.history = history,
            Err(message) => {
                warn!(token, error = %message, "history listing failed");
                self.history.clear();
            }
        }

        true
    }

    /// Loads a history entry as the current snapshot without a network call.
    /// Any fetch still in flight is superseded.
    pub fn select_history(&mut self, url: &str) -> bool {
        let Some(entry) = self
            .history
            .iter()
            .find(|entry| entry.url() == url)
            .cloned()
        else {
            return false;
        };

        self.active.snapshot = None;
        self.is_loading = false;
        self.error = None;
        self.url = Some(entry.url().to_string());
        if let Some(branch) = &entry.branch {
            self.selected_branch = branch.clone();
        }
        self.replace_snapshot(entry);
        true
    }

    /// Clears loading flags, error and snapshot from any state. In-flight
    /// fetches and pulls are abandoned; branch data is kept.
    pub fn reset(&mut self) {
        self.active.snapshot = None;
        self.active.pull = None;
        self.is_loading = false;
        self.is_pulling = false;
        self.error = None;
        self.snapshot = None;
        self.selection.deselect_all();
        self.last_created_files.clear();
    }

    /// Only files of the current snapshot can be selected; anything else is ignored.
    pub fn toggle(&mut self, path: &str, included: bool) -> bool {
        if included && !self.is_selectable(path) {
            return false;
        }
        self.selection.toggle(path, included)
    }

    pub fn select_all(&mut self) {
        match &self.snapshot {
            Some(snapshot) => self.selection.select_all(flatten(&snapshot.contents)),
            None => self.selection.deselect_all(),
        }
    }

    pub fn deselect_all(&mut self) {
        self.selection.deselect_all();
    }

    pub fn is_selected(&self, path: &str) -> bool {
        self.selection.is_selected(path)
    }

    pub fn selected_files(&self) -> Vec<FileEntry> {
        let Some(snapshot) = &self.snapshot else {
            return Vec::new();
        };

        flatten(&snapshot.contents)
            .into_iter()
            .filter(|entry| self.selection.is_selected(&entry.path))
            .cloned()
            .collect()
    }

    /// The caller default when advertised, else `main` or `master`. With
    /// neither of those advertised the first branch wins.
    fn discovered_branch(&self, branches: &[String]) -> Option<String> {
        let advertised = |name: &str| branches.iter().any(|branch| branch == name);
        if !advertised("main") && !advertised("master") {
            return branches.first().cloned();
        }

        [self.default_branch.as_str(), "main", "master"]
            .into_iter()
            .find(|name| advertised(name))
            .map(str::to_string)
    }

    fn is_selectable(&self, path: &str) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|snapshot| crate::tree::find_file(&snapshot.contents, path).is_some())
    }

    fn replace_snapshot(&mut self, snapshot: RepositorySnapshot) {
        self.snapshot = Some(snapshot);
        self.selection.deselect_all();
        self.last_created_files.clear();
    }

    fn fail_pull(&mut self, message: String) {
        let message = non_empty_or(message, PULL_FAILED_FALLBACK);
        self.notices.push_back(Notice::new(
            NoticeLevel::Error,
            format!("Pull failed: {message}"),
        ));
        self.error = Some(message);
    }

    fn issue(&mut self, operation: Operation) -> RequestToken {
        let token = self.next_token;
        self.next_token = self.next_token.saturating_add(1);
        *self.active.slot(operation) = Some(token);
        token
    }

    fn settle(&mut self, operation: Operation, token: RequestToken) -> bool {
        let slot = self.active.slot(operation);
        if *slot != Some(token) {
            debug!(
                token,
                operation = operation.as_str(),
                "discarding stale completion"
            );
            return false;
        }

        *slot = None;
        true
    }
}

fn non_empty_or(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use crate::snapshot::RepoIdentity;

    use super::*;

    fn snapshot(url: &str, paths: &[&str]) -> RepositorySnapshot {
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
                .map(|path| FileEntry::file(path, Some(format!("ref:{path}"))))
                .collect(),
        }
    }

    fn loaded_state() -> RepoState {
        let mut state = RepoState::new("main");
        let token = state.begin_fetch("https://github.com/octo/repo");
        assert!(state.complete_fetch(
            token,
            Ok(snapshot(
                "https://github.com/octo/repo",
                &["src/utils/a.ts", "src/apis/b.ts"]
            ))
        ));
        state
    }

    #[test]
    fn branches_without_main_or_master_select_first_branch() {
        let mut state = RepoState::new("main");
        let token = state.begin_branch_discovery("https://github.com/octo/repo");

        state.complete_branch_discovery(
            token,
            Ok(vec!["dev".to_string(), "feature-x".to_string()]),
        );

        assert_eq!(state.selected_branch(), "dev");
        assert_eq!(state.branches().len(), 2);
    }

    #[test]
    fn branches_with_main_keep_caller_default() {
        let mut state = RepoState::new("main");
        let token = state.begin_branch_discovery("https://github.com/octo/repo");

        state.complete_branch_discovery(token, Ok(vec!["main".to_string(), "dev".to_string()]));

        assert_eq!(state.selected_branch(), "main");
    }

    #[test]
    fn branches_with_master_only_fall_back_to_master() {
        let mut state = RepoState::new("main");
        let token = state.begin_branch_discovery("https://github.com/octo/repo");

        state.complete_branch_discovery(
            token,
            Ok(vec!["master".to_string(), "dev".to_string()]),
        );

        assert_eq!(state.selected_branch(), "master");
    }

    #[test]
    fn configured_default_wins_when_advertised_alongside_main() {
        let mut state = RepoState::new("develop");
        let token = state.begin_branch_discovery("https://github.com/octo/repo");

        state.complete_branch_discovery(
            token,
            Ok(vec!["main".to_string(), "develop".to_string()]),
        );

        assert_eq!(state.selected_branch(), "develop");
    }

    #[test]
    fn branch_choice_does_not_leak_into_the_next_repository() {
        let mut state = RepoState::new("main");
        let first = state.begin_branch_discovery("https://github.com/octo/a");
        state.complete_branch_discovery(first, Ok(vec!["dev".to_string()]));
        assert_eq!(state.selected_branch(), "dev");

        state.reset();
        let second = state.begin_branch_discovery("https://github.com/octo/b");
        state.complete_branch_discovery(second, Ok(vec!["main".to_string()]));

        assert_eq!(state.selected_branch(), "main");
    }

    #[test]
    fn branch_failure_clears_branches_and_keeps_selection() {
        let mut state = RepoState::new("main");
        let first = state.begin_branch_discovery("https://github.com/octo/repo");
        state.complete_branch_discovery(first, Ok(vec!["dev".to_string()]));

        let second = state.begin_branch_discovery("https://github.com/octo/repo");
        state.complete_branch_discovery(second, Err("network down".to_string()));

        assert!(state.branches().is_empty());
        assert_eq!(state.selected_branch(), "dev");
        assert_eq!(state.error(), None);
    }

    #[test]
    fn fetch_success_replaces_snapshot_and_clears_selection() {
        let mut state = loaded_state();
        assert!(state.toggle("src/apis/b.ts", true));

        let token = state.begin_fetch("https://github.com/octo/other");
        assert!(state.is_loading());
        state.complete_fetch(token, Ok(snapshot("https://github.com/octo/other", &["x.rs"])));

        assert!(!state.is_loading());
        assert_eq!(
            state.snapshot().expect("snapshot").url(),
            "https://github.com/octo/other"
        );
        assert!(state.selection().is_empty());
    }

    #[test]
    fn fetch_failure_sets_error_and_keeps_previous_snapshot() {
        let mut state = loaded_state();
        let before = state.snapshot().cloned();

        let token = state.begin_fetch("https://github.com/octo/repo");
        state.complete_fetch(token, Err("repository not found".to_string()));

        assert_eq!(state.error(), Some("repository not found"));
        assert!(!state.is_loading());
        assert_eq!(state.snapshot().cloned(), before);
    }

    #[test]
    fn fetch_failure_without_message_uses_fallback() {
        let mut state = RepoState::new("main");
        let token = state.begin_fetch("https://github.com/octo/repo");
        state.complete_fetch(token, Err("  ".to_string()));

        assert_eq!(state.error(), Some("Failed to fetch repository"));
    }

    #[test]
    fn begin_fetch_clears_previous_error() {
        let mut state = RepoState::new("main");
        let failed = state.begin_fetch("https://github.com/octo/repo");
        state.complete_fetch(failed, Err("boom".to_string()));

        state.begin_fetch("https://github.com/octo/repo");

        assert_eq!(state.error(), None);
        assert!(state.is_loading());
    }

    #[test]
    fn stale_fetch_completion_is_discarded() {
        let mut state = RepoState::new("main");
        let stale = state.begin_fetch("https://github.com/octo/old");
        let current = state.begin_fetch("https://github.com/octo/new");
        assert!(!state.is_active(Operation::Snapshot, stale));
        assert!(state.is_active(Operation::Snapshot, current));

        assert!(state.complete_fetch(
            current,
            Ok(snapshot("https://github.com/octo/new", &["new.rs"]))
        ));
        assert!(!state.complete_fetch(
            stale,
            Ok(snapshot("https://github.com/octo/old", &["old.rs"]))
        ));

        assert_eq!(
            state.snapshot().expect("snapshot").url(),
            "https://github.com/octo/new"
        );
    }

    #[test]
    fn stale_completion_does_not_clear_loading_of_newer_request() {
        let mut state = RepoState::new("main");
        let stale = state.begin_fetch("https://github.com/octo/old");
        let _current = state.begin_fetch("https://github.com/octo/new");

        state.complete_fetch(stale, Err("late failure".to_string()));

        assert!(state.is_loading());
        assert_eq!(state.error(), None);
    }

    #[test]
    fn pull_without_snapshot_is_rejected_with_notice() {
        let mut state = RepoState::new("main");

        assert_eq!(state.begin_pull(), Err(PullRejected::NoSnapshot));
        assert!(!state.is_pulling());
        let notices = state.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn pull_with_empty_selection_is_rejected() {
        let mut state = loaded_state();

        assert_eq!(state.begin_pull(), Err(PullRejected::EmptySelection));
        assert!(!state.is_pulling());
        assert!(!state.has_pending(Operation::Pull));
    }

    #[test]
    fn pull_ticket_carries_only_selected_files() {
        let mut state = loaded_state();
        state.toggle("src/apis/b.ts", true);

        let ticket = state.begin_pull().expect("ticket");

        assert!(state.is_pulling());
        assert_eq!(ticket.files.len(), 1);
        assert_eq!(ticket.files[0].path, "src/apis/b.ts");
        assert_eq!(
            ticket.files[0].download_ref.as_deref(),
            Some("ref:src/apis/b.ts")
        );
    }

    #[test]
    fn pull_success_reports_created_count() {
        let mut state = loaded_state();
        state.select_all();
        let ticket = state.begin_pull().expect("ticket");

        state.complete_pull(
            ticket.token,
            Ok(PullOutcome::created(vec![
                "src/utils/a.ts".to_string(),
                "src/apis/b.ts".to_string(),
            ])),
        );

        assert!(!state.is_pulling());
        assert_eq!(state.last_created_files().len(), 2);
        let notices = state.take_notices();
        assert_eq!(notices[0].level, NoticeLevel::Info);
        assert!(notices[0].message.contains('2'));
    }

    #[test]
    fn pull_success_with_no_created_files_is_a_warning() {
        let mut state = loaded_state();
        state.select_all();
        let ticket = state.begin_pull().expect("ticket");

        state.complete_pull(ticket.token, Ok(PullOutcome::created(Vec::new())));

        assert_eq!(state.error(), None);
        assert_eq!(state.take_notices()[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn pull_failure_sets_error_and_emits_notice() {
        let mut state = loaded_state();
        state.select_all();
        let ticket = state.begin_pull().expect("ticket");

        state.complete_pull(ticket.token, Ok(PullOutcome::failed("disk full")));

        assert_eq!(state.error(), Some("disk full"));
        assert!(!state.is_pulling());
        let notices = state.take_notices();
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.contains("disk full"));
    }

    #[test]
    fn reset_clears_lifecycle_but_keeps_branches() {
        let mut state = loaded_state();
        let branches = state.begin_branch_discovery("https://github.com/octo/repo");
        state.complete_branch_discovery(branches, Ok(vec!["dev".to_string()]));
        state.select_all();
        let ticket = state.begin_pull().expect("ticket");

        state.reset();

        assert!(state.snapshot().is_none());
        assert!(!state.is_pulling());
        assert!(!state.is_loading());
        assert!(state.selection().is_empty());
        assert_eq!(state.branches(), ["dev".to_string()]);
        assert_eq!(state.selected_branch(), "dev");
        assert!(!state.complete_pull(ticket.token, Ok(PullOutcome::created(Vec::new()))));
    }

    #[test]
    fn toggle_ignores_paths_outside_snapshot() {
        let mut state = loaded_state();

        assert!(!state.toggle("not/there.rs", true));
        assert!(!state.toggle("src", true));
        assert!(state.selection().is_empty());
    }

    #[test]
    fn select_history_replaces_snapshot_without_network() {
        let mut state = RepoState::new("main");
        let token = state.begin_history_refresh();
        state.complete_history_refresh(
            token,
            Ok(vec![snapshot("https://github.com/octo/cached", &["a.rs"])]),
        );
        let pending = state.begin_fetch("https://github.com/octo/slow");

        assert!(state.select_history("https://github.com/octo/cached"));

        assert!(!state.is_loading());
        assert_eq!(state.url(), Some("https://github.com/octo/cached"));
        assert!(!state.complete_fetch(pending, Err("late".to_string())));
        assert!(!state.select_history("https://github.com/octo/unknown"));
    }
}
