pub mod cli;
pub mod diagnostics;
pub mod dispatch;

use anyhow::Result;
use clap::Parser;
use tracing::warn;
use treepull_app::App;
use treepull_core::config::TreepullConfig;

use crate::cli::{Cli, Command};
use crate::diagnostics::DiagnosticsSession;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let diagnostics = DiagnosticsSession::initialize(cli.diagnostics)?;
    if let Some(path) = diagnostics.path() {
        eprintln!("Diagnostics enabled: {}", path.display());
    }
    diagnostics.record(format!("command={:?}", cli.command));

    let mut config = match (App::load_config(), &cli.command) {
        (Ok(config), _) => config,
        (Err(error), Command::Doctor) => {
            warn!(error = %error, "config failed to load; doctor runs with defaults");
            TreepullConfig::default()
        }
        (Err(error), _) => return Err(error),
    };

    if let Command::Pull(args) = &cli.command
        && let Some(dest) = &args.dest
    {
        config.pull.destination = dest.clone();
    }

    let app = App::from_config(config)?;
    let result = dispatch::run_with_app(cli.command, &app);
    if let Err(error) = &result {
        diagnostics.record(format!("command failed: {error:#}"));
    }
    result
}
