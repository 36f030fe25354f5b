use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use tracing::{debug, warn};

use crate::lifecycle::{Operation, PullRejected, RepoState, RequestToken};
use crate::snapshot::RepositorySnapshot;
use crate::transport::{PullOutcome, RepoTransport};

#[derive(Debug)]
pub enum Outcome {
    Branches(Result<Vec<String>, String>),
    Snapshot(Result<RepositorySnapshot, String>),
    Pull(Result<PullOutcome, String>),
    History(Result<Vec<RepositorySnapshot>, String>),
}

impl Outcome {
    fn failed(operation: Operation, message: String) -> Self {
        match operation {
            Operation::Branches => Self::Branches(Err(message)),
            Operation::Snapshot => Self::Snapshot(Err(message)),
            Operation::Pull => Self::Pull(Err(message)),
            Operation::History => Self::History(Err(message)),
        }
    }
}

#[derive(Debug)]
pub struct Completion {
    pub token: RequestToken,
    pub outcome: Outcome,
}

/// Runs transport requests on worker threads and applies their completions to
/// a [`RepoState`] on the owning thread.
///
/// Requests never block the caller. Completions are only applied from
/// [`FetchController::poll`] or the `wait*` methods, so every state transition
/// happens on the thread that owns the controller.
pub struct FetchController {
    transport: Arc<dyn RepoTransport>,
    state: RepoState,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    in_flight: usize,
}

impl FetchController {
    pub fn new(transport: Arc<dyn RepoTransport>, default_branch: &str) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            transport,
            state: RepoState::new(default_branch),
            sender,
            receiver,
            in_flight: 0,
        }
    }

    pub fn state(&self) -> &RepoState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RepoState {
        &mut self.state
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn request_branches(&mut self, url: &str) -> RequestToken {
        let token = self.state.begin_branch_discovery(url);
        let url = url.to_string();
        self.spawn(Operation::Branches, token, move |transport| {
            Outcome::Branches(transport.list_branches(&url).map_err(render_error))
        });
        token
    }

    /// Fetches `url` at the currently selected branch.
    pub fn request_snapshot(&mut self, url: &str) -> RequestToken {
        let token = self.state.begin_fetch(url);
        let url = url.to_string();
        let branch = self.state.selected_branch().to_string();
        self.spawn(Operation::Snapshot, token, move |transport| {
            Outcome::Snapshot(
                transport
                    .fetch_snapshot(&url, &branch)
                    .map_err(render_error),
            )
        });
        token
    }

    pub fn request_pull(&mut self) -> Result<RequestToken, PullRejected> {
        let ticket = self.state.begin_pull()?;
        let files = ticket.files;
        self.spawn(Operation::Pull, ticket.token, move |transport| {
            Outcome::Pull(transport.pull_files(&files).map_err(render_error))
        });
        Ok(ticket.token)
    }

    pub fn request_history(&mut self) -> RequestToken {
        let token = self.state.begin_history_refresh();
        self.spawn(Operation::History, token, move |transport| {
            Outcome::History(transport.list_history().map_err(render_error))
        });
        token
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Applies every completion that has already arrived. Returns how many
    /// were received, stale ones included.
    pub fn poll(&mut self) -> usize {
        let mut received = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(completion) => {
                    self.apply(completion);
                    received += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        received
    }

    /// Blocks until one completion arrives. Returns `false` when nothing is in flight.
    pub fn wait(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }

        match self.receiver.recv() {
            Ok(completion) => {
                self.apply(completion);
                true
            }
            Err(_) => {
                self.in_flight = 0;
                false
            }
        }
    }

    pub fn wait_idle(&mut self) {
        while self.wait() {}
    }

    fn apply(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let token = completion.token;
        let applied = match completion.outcome {
            Outcome::Branches(result) => self.state.complete_branch_discovery(token, result),
            Outcome::Snapshot(result) => self.state.complete_fetch(token, result),
            Outcome::Pull(result) => self.state.complete_pull(token, result),
            Outcome::History(result) => self.state.complete_history_refresh(token, result),
        };
        debug!(token, applied, "completion received");
    }

    fn spawn<F>(&mut self, operation: Operation, token: RequestToken, job: F)
    where
        F: FnOnce(&dyn RepoTransport) -> Outcome + Send + 'static,
    {
        let transport = Arc::clone(&self.transport);
        let sender = self.sender.clone();
        self.in_flight += 1;

        thread::spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| job(transport.as_ref())))
                .unwrap_or_else(|_| {
                    warn!(token, operation = operation.as_str(), "worker panicked");
                    Outcome::failed(operation, format!("{} worker panicked", operation.as_str()))
                });
            let _ = sender.send(Completion { token, outcome });
        });
    }
}

fn render_error(error: anyhow::Error) -> String {
    format!("{error:#}")
}
