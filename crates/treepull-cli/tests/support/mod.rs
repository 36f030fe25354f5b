#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;

pub fn new_command_with_temp_home() -> (Command, tempfile::TempDir) {
    let temp_home = tempfile::tempdir().expect("temp home");
    let command = command_for_home(temp_home.path());
    (command, temp_home)
}

pub fn command_for_home(home: &Path) -> Command {
    let binary = assert_cmd::cargo::cargo_bin!("treepull");
    let mut command = Command::new(binary);
    command.env("HOME", home);
    command.env_remove("TREEPULL_LOG");
    command
}

pub fn write_config(home: &Path, contents: &str) {
    let config_dir = home.join(".config").join("treepull");
    fs::create_dir_all(&config_dir).expect("create config dir");
    fs::write(config_dir.join("config.toml"), contents).expect("write config");
}

fn run_git(repo: &Path, args: &[&str]) {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .expect("git command should execute");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// A committed repository at `<root>/srv/octo/demo` on branch `main`.
pub fn init_source_repo(root: &Path) -> PathBuf {
    let source = root.join("srv").join("octo").join("demo");
    fs::create_dir_all(source.join("src").join("components")).expect("source dirs");

    run_git(&source, &["init", "--quiet"]);
    run_git(&source, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    fs::write(source.join("README.md"), "hello\n").expect("write readme");
    fs::write(
        source.join("src").join("components").join("Button.tsx"),
        "export const Button = () => null;\n",
    )
    .expect("write button");
    run_git(&source, &["add", "."]);
    run_git(
        &source,
        &[
            "-c",
            "user.name=treepull-test",
            "-c",
            "user.email=treepull-test@example.com",
            "commit",
            "--quiet",
            "-m",
            "initial",
        ],
    );

    source
}

pub fn assert_timestamp_log_names(entries: &[std::fs::DirEntry]) {
    assert!(!entries.is_empty(), "expected at least one diagnostics log");

    for entry in entries {
        let name = entry
            .file_name()
            .into_string()
            .expect("diagnostics filename utf8");
        let stem = name
            .strip_suffix(".log")
            .expect("diagnostics filename .log suffix");
        assert!(
            !stem.is_empty() && stem.chars().all(|character| character.is_ascii_digit()),
            "diagnostics filename must be <timestamp>.log, got: {name}"
        );
    }
}
