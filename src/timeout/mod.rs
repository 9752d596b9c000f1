//! Timeout configuration for git operations.
//!
//! The scheduler itself never times out an operation; a git command that
//! exceeds its limit fails like any other git error.

use std::time::Duration;

/// Configuration for timeout behavior of repository operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Maximum time allowed for a single git command (clone, pull, push, etc.).
    /// Default: 60 seconds
    pub git_timeout: Duration,

    /// Maximum time allowed for listing repositories through the `gh` CLI.
    /// Default: 30 seconds
    pub listing_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            git_timeout: Duration::from_secs(60),
            listing_timeout: Duration::from_secs(30),
        }
    }
}

impl TimeoutConfig {
    /// Creates a new TimeoutConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the git operation timeout.
    pub fn with_git_timeout(mut self, timeout: Duration) -> Self {
        self.git_timeout = timeout;
        self
    }

    /// Sets the timeout for `gh` CLI calls.
    pub fn with_listing_timeout(mut self, timeout: Duration) -> Self {
        self.listing_timeout = timeout;
        self
    }
}
