//! Error types shared across the crate.

use std::io;

use thiserror::Error;

/// Errors that can occur while listing, scheduling or synchronizing repositories.
///
/// Per-repository failures never surface as this type outside the scheduler;
/// they are recorded as a `failed` status instead.
#[derive(Error, Debug)]
pub enum SyncError {
    /// IO error during file or terminal operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// HTTP transport error while talking to the GitHub API.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration source could not be read or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    /// Configuration values were read but are not usable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The organization or user does not exist or is not visible.
    #[error("{kind} '{owner}' not found or not accessible (API URL: {url})")]
    NotFound {
        kind: &'static str,
        owner: String,
        url: String,
    },

    /// The GitHub API rejected the supplied credentials.
    #[error("Authentication failed. Please provide a valid GitHub token (API URL: {url})")]
    Unauthorized { url: String },

    /// Any other non-success response from the GitHub API.
    #[error("GitHub API returned status {status} (API URL: {url})")]
    Api { status: u16, url: String },

    /// The `gh` CLI is missing or could not list repositories.
    #[error("gh CLI failed: {0}")]
    GhCli(String),

    /// A git command exited with a non-zero status.
    #[error("{message}")]
    Git { command: String, message: String },

    /// A git command did not finish within the configured timeout.
    #[error("git {command} timed out after {secs}s")]
    GitTimeout { command: String, secs: u64 },
}

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;
