use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::command_runner::CommandRunner;
use crate::config::{ConfigError, load_config, resolve_cache_dir, resolve_config_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Pass,
    Fail,
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorCheck {
    pub name: String,
    pub state: CheckState,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorReport {
    pub checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    pub fn has_failures(&self) -> bool {
        self.checks
            .iter()
            .any(|check| check.state == CheckState::Fail)
    }

    pub fn summary(&self) -> String {
        let passed = self
            .checks
            .iter()
            .filter(|check| check.state == CheckState::Pass)
            .count();
        let failed = self.checks.len().saturating_sub(passed);
        format!("{passed} passed, {failed} failed")
    }
}

/// Locations the doctor inspects. Resolution failures are reported as checks.
#[derive(Debug)]
pub struct DoctorPaths {
    pub config_path: Result<PathBuf, ConfigError>,
    pub cache_dir: Result<PathBuf, ConfigError>,
}

impl DoctorPaths {
    pub fn resolve() -> Self {
        Self {
            config_path: resolve_config_path(),
            cache_dir: resolve_cache_dir(),
        }
    }
}

pub fn run_doctor_with_runner(runner: &dyn CommandRunner) -> DoctorReport {
    run_doctor_with(runner, DoctorPaths::resolve())
}

pub fn run_doctor_with(runner: &dyn CommandRunner, paths: DoctorPaths) -> DoctorReport {
    let mut checks = Vec::new();

    checks.push(match env::consts::OS {
        "macos" => pass_check("os is supported", "detected macOS"),
        "linux" => pass_check("os is supported", "detected Linux"),
        detected => fail_check(
            "os is supported",
            format!("detected {detected}, expected macOS or Linux"),
        ),
    });

    checks.push(if is_executable_in_path("git") {
        pass_check("git is installed", "git executable found in PATH")
    } else {
        fail_check("git is installed", "git executable not found in PATH")
    });

    checks.push(check_git_callable(runner));

    checks.push(match &paths.config_path {
        Ok(config_path) => check_config_file(config_path),
        Err(error) => fail_check("config is valid", error.to_string()),
    });

    checks.push(match &paths.cache_dir {
        Ok(cache_dir) => check_cache_writable(cache_dir),
        Err(error) => fail_check("cache directory is writable", error.to_string()),
    });

    DoctorReport { checks }
}

fn check_git_callable(runner: &dyn CommandRunner) -> DoctorCheck {
    match runner.run("git", &["--version"], None) {
        Ok(output) if output.status_code == 0 => {
            pass_check("git is callable", output.stdout_lossy().trim().to_string())
        }
        Ok(output) => fail_check(
            "git is callable",
            format!(
                "git returned exit code {} with output: {}",
                output.status_code,
                output.stderr.trim()
            ),
        ),
        Err(error) => fail_check(
            "git is callable",
            format!("failed to execute git check: {error}"),
        ),
    }
}

fn check_config_file(config_path: &Path) -> DoctorCheck {
    if !config_path.exists() {
        return pass_check(
            "config is valid",
            format!(
                "no config at {}; built-in defaults apply",
                config_path.display()
            ),
        );
    }

    match load_config(config_path) {
        Ok(_) => pass_check(
            "config is valid",
            format!("loaded {}", config_path.display()),
        ),
        Err(error) => fail_check("config is valid", error.to_string()),
    }
}

fn check_cache_writable(cache_dir: &Path) -> DoctorCheck {
    let probe = cache_dir.join(".treepull-doctor-probe");
    let result = fs::create_dir_all(cache_dir)
        .and_then(|()| fs::write(&probe, b"ok"))
        .and_then(|()| fs::remove_file(&probe));

    match result {
        Ok(()) => pass_check(
            "cache directory is writable",
            format!("{} is writable", cache_dir.display()),
        ),
        Err(error) => fail_check(
            "cache directory is writable",
            format!("{}: {error}", cache_dir.display()),
        ),
    }
}

fn pass_check(name: &str, details: impl Into<String>) -> DoctorCheck {
    DoctorCheck {
        name: name.to_string(),
        state: CheckState::Pass,
        details: details.into(),
    }
}

fn fail_check(name: &str, details: impl Into<String>) -> DoctorCheck {
    DoctorCheck {
        name: name.to_string(),
        state: CheckState::Fail,
        details: details.into(),
    }
}

fn is_executable_in_path(program: &str) -> bool {
    let program_path = Path::new(program);

    if program_path.is_absolute() || program.contains('/') {
        return is_executable_file(program_path);
    }

    let path_value = match env::var_os("PATH") {
        Some(value) => value,
        None => return false,
    };

    env::split_paths(&path_value)
        .map(|directory| directory.join(program))
        .any(|candidate| is_executable_file(&candidate))
}

fn is_executable_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match path.metadata() {
            Ok(metadata) => metadata.permissions().mode() & 0o111 != 0,
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    {
        true
    }
}
