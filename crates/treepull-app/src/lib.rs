mod fetch;
mod history;
mod pull;
mod session;

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use treepull_core::command_runner::{CommandRunner, SystemCommandRunner};
use treepull_core::config::{
    TreepullConfig, load_config_or_default, resolve_cache_dir, resolve_config_dir,
    resolve_config_path,
};
use treepull_core::controller::FetchController;
use treepull_core::doctor::{DoctorReport, run_doctor_with_runner};
use treepull_core::git::GitTransport;
use treepull_core::history::{HistoryStore, history_path};
use treepull_core::transport::RepoTransport;

pub use fetch::{TreeRequest, TreeResult};
pub use history::{ForgetError, HistoryRow};
pub use pull::{PullPathError, PullRequest, PullResult, PullSelection};

pub struct App {
    config: TreepullConfig,
    runner: Arc<dyn CommandRunner>,
    transport: Arc<dyn RepoTransport>,
    history: Arc<HistoryStore>,
}

impl App {
    /// Reads `~/.config/treepull/config.toml`; a missing file means defaults.
    pub fn load_config() -> Result<TreepullConfig> {
        let config_path = resolve_config_path().context("failed to resolve config path")?;

        load_config_or_default(&config_path).map_err(|error| {
            anyhow!(
                "{error}\nFix {} and retry, or remove it to use the defaults.",
                config_path.display()
            )
        })
    }

    /// Wires the git-backed transport, cache and history for `config`.
    pub fn from_config(config: TreepullConfig) -> Result<Self> {
        let config_dir = resolve_config_dir().context("failed to resolve config directory")?;
        let cache_dir = resolve_cache_dir().context("failed to resolve cache directory")?;
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new());
        let history = Arc::new(HistoryStore::new(
            history_path(&config_dir),
            config.history.limit,
        ));

        let transport = GitTransport::new(
            Arc::clone(&runner),
            cache_dir,
            Arc::clone(&history),
            config.fetch_limits(),
        )
        .with_destination(config.pull.destination.clone(), config.pull.layout);

        Ok(Self::with_parts(config, runner, Arc::new(transport), history))
    }

    pub fn with_parts(
        config: TreepullConfig,
        runner: Arc<dyn CommandRunner>,
        transport: Arc<dyn RepoTransport>,
        history: Arc<HistoryStore>,
    ) -> Self {
        Self {
            config,
            runner,
            transport,
            history,
        }
    }

    pub fn config(&self) -> &TreepullConfig {
        &self.config
    }

    pub fn doctor(&self) -> Result<DoctorReport> {
        Ok(run_doctor_with_runner(self.runner.as_ref()))
    }

    /// A fresh controller for an interactive session.
    pub fn controller(&self) -> FetchController {
        FetchController::new(
            Arc::clone(&self.transport),
            &self.config.fetch.default_branch,
        )
    }
}
