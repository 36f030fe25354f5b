use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use treepull_core::category::Category;
use treepull_core::listing::SortColumn;

#[derive(Debug, Parser)]
#[command(name = "treepull")]
#[command(bin_name = "treepull")]
#[command(version)]
#[command(about = "Browse remote repository trees and pull selected files")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[arg(long, global = true, help = "Write a diagnostics log for this run")]
    pub diagnostics: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(about = "Open the interactive repository browser")]
    Browse {
        #[arg(help = "Repository URL to open immediately")]
        url: Option<String>,
    },
    #[command(about = "List branches advertised by a repository")]
    Branches {
        #[arg(help = "Repository URL")]
        url: String,
    },
    #[command(about = "Print the flattened file list of a repository")]
    Tree(TreeArgs),
    #[command(about = "Write selected repository files to disk")]
    Pull(PullArgs),
    #[command(about = "Show or edit previously fetched repositories")]
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },
    #[command(about = "Run environment and configuration checks")]
    Doctor,
}

#[derive(Debug, Args)]
pub struct TreeArgs {
    #[arg(help = "Repository URL")]
    pub url: String,
    #[arg(long, help = "Branch to fetch instead of the discovered default")]
    pub branch: Option<String>,
    #[arg(long, value_enum, default_value_t = SortArg::Name)]
    pub sort: SortArg,
    #[arg(long, help = "Sort descending")]
    pub desc: bool,
    #[arg(long, value_enum, help = "Only show files of this category")]
    pub category: Option<CategoryArg>,
    #[arg(long, help = "Case-insensitive substring over name and path")]
    pub filter: Option<String>,
}

#[derive(Debug, Args)]
pub struct PullArgs {
    #[arg(help = "Repository URL")]
    pub url: String,
    #[arg(long, help = "Branch to fetch instead of the discovered default")]
    pub branch: Option<String>,
    #[arg(long, conflicts_with = "paths", help = "Pull every file in the tree")]
    pub all: bool,
    #[arg(
        long = "path",
        value_name = "PATH",
        required_unless_present = "all",
        help = "Repository-relative file path to pull (repeatable)"
    )]
    pub paths: Vec<String>,
    #[arg(long, value_name = "DIR", help = "Destination directory")]
    pub dest: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum HistoryAction {
    #[command(about = "List previously fetched repositories")]
    List,
    #[command(about = "Forget a repository")]
    Remove {
        #[arg(help = "Repository URL")]
        url: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Name,
    Path,
    Category,
}

impl From<SortArg> for SortColumn {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Name => Self::Name,
            SortArg::Path => Self::Path,
            SortArg::Category => Self::Category,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    Backend,
    Component,
    Util,
    Page,
    Other,
}

impl From<CategoryArg> for Category {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Backend => Self::Backend,
            CategoryArg::Component => Self::Component,
            CategoryArg::Util => Self::Util,
            CategoryArg::Page => Self::Page,
            CategoryArg::Other => Self::Other,
        }
    }
}
