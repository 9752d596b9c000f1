use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `git` subcommands with a per-command time limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCli {
    pub binary: PathBuf,
    pub timeout: Duration,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("git"),
            timeout: Duration::from_secs(60),
        }
    }
}

impl GitCli {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Run `git <args>` in `cwd`.
    ///
    /// Non-zero exits become [`SyncError::Git`] carrying git's own message;
    /// exceeding the timeout kills the child and returns
    /// [`SyncError::GitTimeout`].
    pub async fn run<I, S>(&self, cwd: &Path, args: I) -> SyncResult<GitOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let owned_args: Vec<OsString> = args
            .into_iter()
            .map(|arg| arg.as_ref().to_os_string())
            .collect();
        let subcommand = owned_args
            .first()
            .map(|arg| arg.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut command = Command::new(&self.binary);
        command
            .current_dir(cwd)
            .args(&owned_args)
            // Parsed output (e.g. "Already up to date.") must not be localized.
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(command = %render_command(&self.binary, &owned_args), cwd = %cwd.display(), "running git");

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result.map_err(|source| SyncError::Git {
                command: subcommand.clone(),
                message: format!("failed to run git {}: {}", subcommand, source),
            })?,
            Err(_) => {
                return Err(SyncError::GitTimeout {
                    command: subcommand,
                    secs: self.timeout.as_secs(),
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(SyncError::Git {
                message: failure_message(&subcommand, output.status.code(), &stdout, &stderr),
                command: subcommand,
            });
        }

        Ok(GitOutput { stdout, stderr })
    }
}

/// Git's own explanation of a failure, falling back to the exit status.
fn failure_message(subcommand: &str, status: Option<i32>, stdout: &str, stderr: &str) -> String {
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    match status {
        Some(code) => format!("git {} exited with status {}", subcommand, code),
        None => format!("git {} was terminated by a signal", subcommand),
    }
}

fn render_command(binary: &Path, args: &[OsString]) -> String {
    let mut rendered = binary.to_string_lossy().into_owned();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}
