use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::debug;

use super::command::GitCli;
use crate::error::SyncResult;
use crate::github::Repository;
use crate::parallel::{ExecutionResult, ResultKind};
use crate::status::{RepoStatus, StatusReporter};

const REMOTE: &str = "origin";

/// Run-wide settings for repository operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub target_dir: PathBuf,
    pub use_ssh: bool,
    pub pull_from_default: bool,
    /// A token was supplied, so private repositories can be cloned.
    pub has_token: bool,
}

/// Clones, pulls or deletes one repository, reporting progress as it goes.
///
/// Every public operation settles the repository in a terminal status and
/// returns its result; git failures never propagate to the caller.
#[derive(Debug, Clone)]
pub struct RepoExecutor {
    git: GitCli,
    options: SyncOptions,
}

impl RepoExecutor {
    pub fn new(git: GitCli, options: SyncOptions) -> Self {
        Self { git, options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn repo_path(&self, name: &str) -> PathBuf {
        self.options.target_dir.join(name)
    }

    /// Pull when the repository is already present, clone otherwise.
    pub async fn process(&self, repo: &Repository, reporter: &StatusReporter) -> ExecutionResult {
        let exists = is_dir(&self.repo_path(&repo.name)).await;

        if repo.private && !self.options.has_token && !exists {
            reporter.report(RepoStatus::Skipped, "Private repo, no token provided");
            return ExecutionResult::ok(ResultKind::Skipped);
        }

        if exists {
            self.pull_repository(&repo.name, reporter).await
        } else {
            self.clone_repository(repo, reporter).await
        }
    }

    pub async fn clone_repository(
        &self,
        repo: &Repository,
        reporter: &StatusReporter,
    ) -> ExecutionResult {
        match self.try_clone(repo, reporter).await {
            Ok(result) => result,
            Err(err) => fail(reporter, ResultKind::Clone, err.to_string()),
        }
    }

    async fn try_clone(
        &self,
        repo: &Repository,
        reporter: &StatusReporter,
    ) -> SyncResult<ExecutionResult> {
        reporter.report(RepoStatus::Cloning, "Cloning...");
        let url = repo.clone_url_for(self.options.use_ssh);
        self.git
            .run(&self.options.target_dir, ["clone", url, repo.name.as_str()])
            .await?;

        reporter.report(RepoStatus::Cloning, "Fetching all branches...");
        self.git
            .run(&self.repo_path(&repo.name), ["fetch", "--all"])
            .await?;

        reporter.report(RepoStatus::Success, "Successfully cloned");
        Ok(ExecutionResult::ok(ResultKind::Cloned))
    }

    pub async fn pull_repository(&self, name: &str, reporter: &StatusReporter) -> ExecutionResult {
        match self.try_pull(name, reporter).await {
            Ok(result) => result,
            Err(err) => fail(reporter, ResultKind::Pull, err.to_string()),
        }
    }

    async fn try_pull(&self, name: &str, reporter: &StatusReporter) -> SyncResult<ExecutionResult> {
        let path = self.repo_path(name);

        reporter.report(RepoStatus::Pulling, "Checking status...");
        if self.has_uncommitted_changes(&path).await? {
            reporter.report(RepoStatus::Uncommitted, "Has uncommitted changes, skipped");
            return Ok(ExecutionResult::ok(ResultKind::Uncommitted));
        }

        reporter.report(RepoStatus::Pulling, "Fetching all branches...");
        self.git.run(&path, ["fetch", "--all"]).await?;

        if self.options.pull_from_default {
            return self.pull_from_default(&path, reporter).await;
        }

        reporter.report(RepoStatus::Pulling, "Pulling changes...");
        self.git.run(&path, ["pull"]).await?;
        reporter.report(RepoStatus::Success, "Successfully pulled");
        Ok(ExecutionResult::ok(ResultKind::Pulled))
    }

    async fn pull_from_default(
        &self,
        path: &Path,
        reporter: &StatusReporter,
    ) -> SyncResult<ExecutionResult> {
        let current = self
            .git
            .run(path, ["rev-parse", "--abbrev-ref", "HEAD"])
            .await?
            .stdout
            .trim()
            .to_string();

        reporter.report(RepoStatus::Pulling, "Detecting default branch...");
        let default = self.default_branch(path).await;

        if current == default {
            reporter.report(
                RepoStatus::Pulling,
                format!("Pulling {} (current branch)...", default),
            );
            self.git.run(path, ["pull"]).await?;
            reporter.report(RepoStatus::Success, format!("Successfully pulled {}", default));
            return Ok(ExecutionResult::ok(ResultKind::PulledDefault));
        }

        reporter.report(
            RepoStatus::Pulling,
            format!("Merging changes from {}...", default),
        );
        match self.merge_default(path, &current, &default, reporter).await {
            Ok(result) => Ok(result),
            Err(err) => {
                debug!(error = %err, "default branch merge unavailable, pulling instead");
                reporter.report(RepoStatus::Pulling, "Falling back to regular pull...");
                self.git.run(path, ["pull"]).await?;
                reporter.report(RepoStatus::Success, "Successfully pulled (fallback)");
                Ok(ExecutionResult::ok(ResultKind::Pulled))
            }
        }
    }

    /// Merge `origin/<default>` into the current branch and push the result.
    ///
    /// Errors returned here are infrastructure failures; merge conflicts are
    /// reported as a failed result instead.
    async fn merge_default(
        &self,
        path: &Path,
        current: &str,
        default: &str,
        reporter: &StatusReporter,
    ) -> SyncResult<ExecutionResult> {
        let remote_default = format!("{}/{}", REMOTE, default);
        let remote_branches = self.git.run(path, ["branch", "-r"]).await?.stdout;

        if !parse_remote_branches(&remote_branches)
            .iter()
            .any(|branch| branch == &remote_default)
        {
            reporter.report(
                RepoStatus::Pulling,
                format!("Remote {} not found, pulling current branch", default),
            );
            self.git.run(path, ["pull"]).await?;
            reporter.report(RepoStatus::Success, "Successfully pulled");
            return Ok(ExecutionResult::ok(ResultKind::Pulled));
        }

        let merge = match self.git.run(path, ["merge", remote_default.as_str()]).await {
            Ok(output) => output,
            Err(err) => {
                let message = err.to_string();
                reporter.report(
                    RepoStatus::Failed,
                    format!("Merge conflict with {}: {}", default, message),
                );
                return Ok(ExecutionResult::failed(ResultKind::MergeConflict, message)
                    .with_details(json!({ "from": default, "to": current })));
            }
        };

        if is_already_up_to_date(&merge.stdout) {
            reporter.report(
                RepoStatus::Success,
                format!("Already up to date with {}", default),
            );
            return Ok(ExecutionResult::ok(ResultKind::UpToDateWithDefault)
                .with_details(json!({ "default_branch": default, "current_branch": current })));
        }

        reporter.report(RepoStatus::Pulling, "Pushing merged changes...");
        let details = match self.git.run(path, ["push"]).await {
            Ok(_) => {
                reporter.report(
                    RepoStatus::Success,
                    format!("Successfully merged {} into {}", default, current),
                );
                json!({ "from": default, "to": current })
            }
            Err(err) => {
                reporter.report(
                    RepoStatus::Success,
                    format!("Merged {} into {} (push failed: {})", default, current, err),
                );
                json!({ "from": default, "to": current, "push_error": err.to_string() })
            }
        };
        Ok(ExecutionResult::ok(ResultKind::MergedFromDefault).with_details(details))
    }

    /// Best guess at the remote's default branch. Never fails; `main` is the
    /// last resort.
    pub async fn default_branch(&self, path: &Path) -> String {
        let head_ref = format!("refs/remotes/{}/HEAD", REMOTE);

        if let Ok(output) = self.git.run(path, ["symbolic-ref", head_ref.as_str()]).await {
            if let Some(branch) = parse_remote_head(&output.stdout, REMOTE) {
                return branch;
            }
        }

        if self
            .git
            .run(path, ["remote", "set-head", REMOTE, "--auto"])
            .await
            .is_ok()
        {
            if let Ok(output) = self.git.run(path, ["symbolic-ref", head_ref.as_str()]).await {
                if let Some(branch) = parse_remote_head(&output.stdout, REMOTE) {
                    return branch;
                }
            }
        }

        match self.git.run(path, ["branch", "-r"]).await {
            Ok(output) => guess_default_branch(&parse_remote_branches(&output.stdout)),
            Err(_) => "main".to_string(),
        }
    }

    pub async fn delete_repository(&self, name: &str, reporter: &StatusReporter) -> ExecutionResult {
        match self.try_delete(name, reporter).await {
            Ok(result) => result,
            Err(err) => fail(reporter, ResultKind::Delete, err.to_string()),
        }
    }

    async fn try_delete(&self, name: &str, reporter: &StatusReporter) -> SyncResult<ExecutionResult> {
        let path = self.repo_path(name);
        if !is_dir(&path).await {
            reporter.report(RepoStatus::Skipped, "Not found locally");
            return Ok(ExecutionResult::ok(ResultKind::Skipped));
        }

        reporter.report(RepoStatus::Checking, "Checking for uncommitted changes...");
        if tokio::fs::metadata(path.join(".git")).await.is_err() {
            reporter.report(RepoStatus::Skipped, "Not a git repository");
            return Ok(ExecutionResult::ok(ResultKind::Skipped));
        }
        match self.has_uncommitted_changes(&path).await {
            Ok(true) => {
                reporter.report(RepoStatus::Uncommitted, "Has uncommitted changes, skipped");
                return Ok(ExecutionResult::ok(ResultKind::Uncommitted));
            }
            Ok(false) => {}
            Err(_) => {
                reporter.report(RepoStatus::Skipped, "Not a git repository");
                return Ok(ExecutionResult::ok(ResultKind::Skipped));
            }
        }

        reporter.report(RepoStatus::Deleting, "Deleting repository...");
        tokio::fs::remove_dir_all(&path).await?;
        reporter.report(RepoStatus::Success, "Successfully deleted");
        Ok(ExecutionResult::ok(ResultKind::Deleted))
    }

    async fn has_uncommitted_changes(&self, path: &Path) -> SyncResult<bool> {
        let output = self.git.run(path, ["status", "--porcelain"]).await?;
        Ok(!output.stdout.trim().is_empty())
    }
}

fn fail(reporter: &StatusReporter, kind: ResultKind, message: String) -> ExecutionResult {
    reporter.report(RepoStatus::Failed, format!("Error: {}", message));
    ExecutionResult::failed(kind, message)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

/// Branch name from `git symbolic-ref refs/remotes/<remote>/HEAD` output.
pub fn parse_remote_head(output: &str, remote: &str) -> Option<String> {
    let prefix = format!("refs/remotes/{}/", remote);
    let branch = output.trim().strip_prefix(&prefix)?;
    if branch.is_empty() {
        None
    } else {
        Some(branch.to_string())
    }
}

/// Remote branch names from `git branch -r`, skipping `HEAD -> ...` aliases.
pub fn parse_remote_branches(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains("->") && line.contains('/'))
        .map(str::to_string)
        .collect()
}

/// Pick `main`, then `master`, then the first remote branch, then `main`.
pub fn guess_default_branch(remote_branches: &[String]) -> String {
    for candidate in ["main", "master"] {
        let suffix = format!("/{}", candidate);
        if remote_branches.iter().any(|branch| branch.ends_with(&suffix)) {
            return candidate.to_string();
        }
    }
    remote_branches
        .first()
        .and_then(|branch| branch.split_once('/'))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| "main".to_string())
}

/// Whether `git merge` output says nothing was merged.
pub fn is_already_up_to_date(merge_stdout: &str) -> bool {
    merge_stdout.contains("Already up to date") || merge_stdout.contains("Already up-to-date")
}
