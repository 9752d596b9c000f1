//! Per-repository status tracking.
//!
//! This module holds the task record store that the scheduler writes and the
//! renderer reads:
//! - **RepoStatus**: closed set of states a repository moves through
//! - **RepoTask**: the mutable status record for one repository
//! - **TaskStore**: name-ordered map of records plus the error list
//! - **StatusReporter**: capability handed to an operation, bound to one repository

mod reporter;
mod store;

use std::time::{Duration, Instant};

use serde::Serialize;

pub use reporter::{StatusListener, StatusReporter};
pub use store::{StatusChange, TaskStore};

/// Status of a single repository during a run.
///
/// `Success`, `Failed`, `Skipped` and `Uncommitted` are terminal. Operations
/// may move between the in-progress states in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoStatus {
    Pending,
    Checking,
    Cloning,
    Pulling,
    Deleting,
    Success,
    Failed,
    Skipped,
    Uncommitted,
}

impl RepoStatus {
    /// Whether the repository has settled for this run.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RepoStatus::Success | RepoStatus::Failed | RepoStatus::Skipped | RepoStatus::Uncommitted
        )
    }

    /// Whether an operation is actively working on the repository.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            RepoStatus::Checking | RepoStatus::Cloning | RepoStatus::Pulling | RepoStatus::Deleting
        )
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            RepoStatus::Pending => "pending",
            RepoStatus::Checking => "checking",
            RepoStatus::Cloning => "cloning",
            RepoStatus::Pulling => "pulling",
            RepoStatus::Deleting => "deleting",
            RepoStatus::Success => "success",
            RepoStatus::Failed => "failed",
            RepoStatus::Skipped => "skipped",
            RepoStatus::Uncommitted => "uncommitted",
        }
    }

    /// Icon shown at the start of a status line.
    pub fn icon(self) -> &'static str {
        match self {
            RepoStatus::Pending => "⏳",
            RepoStatus::Cloning => "📦",
            RepoStatus::Pulling => "📥",
            RepoStatus::Checking => "🔍",
            RepoStatus::Deleting => "🗑️",
            RepoStatus::Success => "✅",
            RepoStatus::Failed => "❌",
            RepoStatus::Skipped => "⚠️",
            RepoStatus::Uncommitted => "🔄",
        }
    }

    /// Message used when a committed line has no message of its own.
    pub fn default_message(self) -> &'static str {
        match self {
            RepoStatus::Pending => "",
            RepoStatus::Success => "Successfully pulled",
            RepoStatus::Failed => "Failed to pull",
            RepoStatus::Skipped => "Skipped - not a git repository",
            RepoStatus::Uncommitted => "Has uncommitted changes",
            RepoStatus::Cloning => "Cloning repository...",
            RepoStatus::Pulling => "Pulling updates...",
            RepoStatus::Checking => "Checking for uncommitted changes...",
            RepoStatus::Deleting => "Deleting repository...",
        }
    }
}

/// Status record for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTask {
    /// Unique repository name; also the sort key.
    pub name: String,
    pub status: RepoStatus,
    /// Description of the current or last action. Replaced on every update.
    pub message: String,
    pub start_time: Instant,
    /// Set on every transition except into `Pending`.
    pub end_time: Option<Instant>,
    /// Assigned the first time the repository fails, never reassigned.
    pub error_number: Option<u32>,
    /// Message recorded in the error list under `error_number`.
    pub recorded_error: Option<String>,
}

impl RepoTask {
    pub(crate) fn new(name: String, now: Instant) -> Self {
        Self {
            name,
            status: RepoStatus::Pending,
            message: String::new(),
            start_time: now,
            end_time: None,
            error_number: None,
            recorded_error: None,
        }
    }

    /// Elapsed time to display: frozen once terminal, ticking otherwise.
    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.end_time {
            Some(end) if self.status.is_terminal() => end.saturating_duration_since(self.start_time),
            _ => now.saturating_duration_since(self.start_time),
        }
    }
}

/// One entry of the end-of-run error list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub number: u32,
    pub name: String,
    /// Full, untruncated failure message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(RepoStatus::Success.is_terminal());
        assert!(RepoStatus::Failed.is_terminal());
        assert!(RepoStatus::Skipped.is_terminal());
        assert!(RepoStatus::Uncommitted.is_terminal());
        assert!(!RepoStatus::Pending.is_terminal());
        assert!(!RepoStatus::Pulling.is_terminal());
    }

    #[test]
    fn test_in_progress_excludes_pending_and_terminal() {
        for status in [
            RepoStatus::Checking,
            RepoStatus::Cloning,
            RepoStatus::Pulling,
            RepoStatus::Deleting,
        ] {
            assert!(status.is_in_progress());
            assert!(!status.is_terminal());
        }
        assert!(!RepoStatus::Pending.is_in_progress());
        assert!(!RepoStatus::Success.is_in_progress());
    }

    #[test]
    fn test_elapsed_freezes_at_end_time_for_terminal_status() {
        let start = Instant::now();
        let mut task = RepoTask::new("repo".to_string(), start);
        task.status = RepoStatus::Success;
        task.end_time = Some(start + Duration::from_millis(1500));

        let later = start + Duration::from_secs(10);
        assert_eq!(task.elapsed(later), Duration::from_millis(1500));
    }

    #[test]
    fn test_elapsed_ticks_while_active() {
        let start = Instant::now();
        let mut task = RepoTask::new("repo".to_string(), start);
        task.status = RepoStatus::Pulling;
        task.end_time = Some(start + Duration::from_millis(100));

        let later = start + Duration::from_secs(3);
        assert_eq!(task.elapsed(later), Duration::from_secs(3));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&RepoStatus::Uncommitted).unwrap();
        assert_eq!(json, "\"uncommitted\"");
    }
}
