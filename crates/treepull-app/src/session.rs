use anyhow::{Result, bail};
use tracing::debug;
use treepull_core::controller::FetchController;
use treepull_core::names::{RepoLocator, parse_repo_url};

use crate::App;

/// A controller holding a freshly fetched snapshot of `url`.
pub(crate) struct LoadedRepo {
    pub(crate) locator: RepoLocator,
    pub(crate) controller: FetchController,
}

/// Discovers branches unless `branch` is given, then fetches and waits for the
/// snapshot. Any fetch error becomes the returned error.
pub(crate) fn load_repo(app: &App, url: &str, branch: Option<&str>) -> Result<LoadedRepo> {
    let locator = parse_repo_url(url)?;
    let mut controller = app.controller();
    debug!(url, branch = ?branch, "loading repository");

    match branch.map(str::trim).filter(|value| !value.is_empty()) {
        Some(branch) => controller.state_mut().select_branch(branch),
        None => {
            controller.request_branches(url);
            controller.wait_idle();
        }
    }

    controller.request_snapshot(url);
    controller.wait_idle();

    let state = controller.state();
    if let Some(error) = state.error() {
        bail!("{error}");
    }
    if state.snapshot().is_none() {
        bail!("no snapshot was loaded for {}", locator.full_name());
    }

    Ok(LoadedRepo {
        locator,
        controller,
    })
}
