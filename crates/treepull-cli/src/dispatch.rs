use anyhow::Result;
use comfy_table::{Cell, ContentArrangement, Table};
use treepull_app::{
    App, HistoryRow, PullRequest, PullResult, PullSelection, TreeRequest, TreeResult,
};
use treepull_core::doctor::{CheckState, DoctorReport};
use treepull_core::lifecycle::NoticeLevel;
use treepull_core::listing::{FileQuery, SortDirection, SortState};

use crate::cli::{Command, HistoryAction, PullArgs, TreeArgs};

pub fn run_with_app(command: Command, app: &App) -> Result<()> {
    match command {
        Command::Browse { url } => treepull_tui::run_browse(app, url),
        Command::Branches { url } => run_branches_command(app, &url),
        Command::Tree(args) => run_tree_command(app, args),
        Command::Pull(args) => run_pull_command(app, args),
        Command::History { action } => match action.unwrap_or(HistoryAction::List) {
            HistoryAction::List => run_history_list_command(app),
            HistoryAction::Remove { url } => run_history_remove_command(app, &url),
        },
        Command::Doctor => run_doctor_command(app),
    }
}

fn run_branches_command(app: &App, url: &str) -> Result<()> {
    for branch in app.branches(url)? {
        println!("{branch}");
    }
    Ok(())
}

fn run_tree_command(app: &App, args: TreeArgs) -> Result<()> {
    let request = TreeRequest {
        url: args.url,
        branch: args.branch,
        sort: SortState {
            column: args.sort.into(),
            direction: if args.desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            },
        },
        query: FileQuery {
            text: args.filter.unwrap_or_default(),
            category: args.category.map(Into::into),
        },
    };

    let result = app.tree(request)?;
    print_tree(&result);
    Ok(())
}

fn print_tree(result: &TreeResult) {
    println!(
        "{} ({}): {} of {} files shown",
        result.full_name,
        result.branch,
        result.rows.len(),
        result.total_files
    );
    if result.truncated {
        println!("Listing truncated by fetch limits.");
    }

    if result.rows.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Path", "Category"]);

    for row in &result.rows {
        table.add_row(vec![
            Cell::new(row.name.as_str()),
            Cell::new(row.path.as_str()),
            Cell::new(row.category.as_str()),
        ]);
    }

    println!("{table}");
}

fn run_pull_command(app: &App, args: PullArgs) -> Result<()> {
    let selection = if args.all {
        PullSelection::All
    } else {
        PullSelection::Paths(args.paths)
    };

    let result = app.pull(PullRequest {
        url: args.url,
        branch: args.branch,
        selection,
    })?;
    print_pull_result(app, &result);
    Ok(())
}

fn print_pull_result(app: &App, result: &PullResult) {
    println!(
        "Pulled {} of {} selected file(s) from {} ({}) into {}",
        result.created_files.len(),
        result.requested,
        result.url,
        result.branch,
        app.config().pull.destination.display()
    );
    for created in &result.created_files {
        println!("  {created}");
    }

    for notice in &result.notices {
        if notice.level != NoticeLevel::Info {
            eprintln!("{}", notice.message);
        }
    }
}

fn run_history_list_command(app: &App) -> Result<()> {
    let rows = app.history()?;
    if rows.is_empty() {
        println!("No repositories in history.");
        return Ok(());
    }

    print_history(&rows);
    Ok(())
}

fn print_history(rows: &[HistoryRow]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Repository", "Branch", "Files", "Fetched", "URL"]);

    for row in rows {
        let files = if row.truncated {
            format!("{}+", row.file_count)
        } else {
            row.file_count.to_string()
        };

        table.add_row(vec![
            Cell::new(row.full_name.as_str()),
            Cell::new(row.branch.as_str()),
            Cell::new(files),
            Cell::new(row.fetched_at.as_str()),
            Cell::new(row.url.as_str()),
        ]);
    }

    println!("{table}");
}

fn run_history_remove_command(app: &App, url: &str) -> Result<()> {
    let removed = app.forget(url)?;
    println!("Removed {} from history.", removed.full_name);
    Ok(())
}

fn run_doctor_command(app: &App) -> Result<()> {
    let report = app.doctor()?;
    print_doctor_report(&report);
    Ok(())
}

fn print_doctor_report(report: &DoctorReport) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Check", "Status", "Details"]);

    for check in &report.checks {
        let status = match check.state {
            CheckState::Pass => "PASS",
            CheckState::Fail => "FAIL",
        };

        table.add_row(vec![
            Cell::new(check.name.as_str()),
            Cell::new(status),
            Cell::new(check.details.as_str()),
        ]);
    }

    println!("{table}");
    println!("{}", report.summary());
}
