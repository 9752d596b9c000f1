use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::{Owner, Repository, RepositorySource};
use crate::error::{SyncError, SyncResult};

const LIST_LIMIT: &str = "1000";
const LIST_FIELDS: &str = "name,isPrivate,isFork,url,sshUrl";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhRepo {
    name: String,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    is_fork: bool,
    url: String,
    #[serde(default)]
    ssh_url: String,
}

impl From<GhRepo> for Repository {
    fn from(repo: GhRepo) -> Self {
        Repository {
            name: repo.name,
            clone_url: format!("{}.git", repo.url),
            ssh_url: repo.ssh_url,
            html_url: repo.url,
            private: repo.is_private,
            fork: repo.is_fork,
        }
    }
}

/// Parse the JSON printed by `gh repo list --json ...`.
pub fn parse_gh_output(json: &str) -> SyncResult<Vec<Repository>> {
    let repos: Vec<GhRepo> = serde_json::from_str(json)?;
    Ok(repos.into_iter().map(Repository::from).collect())
}

async fn run_gh(args: &[&str], timeout: Duration) -> SyncResult<String> {
    let mut command = Command::new("gh");
    command
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| SyncError::GhCli(format!("gh {} timed out", args.join(" "))))?
        .map_err(|err| SyncError::GhCli(format!("gh is not available: {}", err)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SyncError::GhCli(stderr.trim().to_string()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Lists repositories through an installed and authenticated `gh`.
#[derive(Debug, Clone)]
pub struct GhCliSource {
    timeout: Duration,
}

impl GhCliSource {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl RepositorySource for GhCliSource {
    async fn list(&self, owner: &Owner) -> SyncResult<Vec<Repository>> {
        debug!(owner = owner.name(), "listing repositories with gh");
        let stdout = run_gh(
            &[
                "repo",
                "list",
                owner.name(),
                "--json",
                LIST_FIELDS,
                "--limit",
                LIST_LIMIT,
            ],
            self.timeout,
        )
        .await?;
        parse_gh_output(&stdout)
    }
}

/// Token from `gh auth token`, if gh is installed and logged in.
pub async fn gh_auth_token(timeout: Duration) -> Option<String> {
    let token = run_gh(&["auth", "token"], timeout).await.ok()?;
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
