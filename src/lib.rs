//! pull-all: keep local clones of every repository of a GitHub organization
//! or user up to date.
//!
//! Repositories are listed once, then cloned, pulled or deleted by a bounded
//! scheduler while a terminal renderer shows per-repository status.
//!
//! # Overview
//!
//! - **parallel**: the bounded scheduler driving operations over all items
//! - **status**: the task record store every status update goes through
//! - **ui**: append-only and windowed terminal rendering plus the final summary
//! - **git**: clone, pull, pull-from-default and delete over the git CLI
//! - **github**: repository listing through `gh` or the REST API
//! - **config**: layered run configuration

pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod parallel;
pub mod status;
pub mod timeout;
pub mod ui;

pub use crate::config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use parallel::{BoundedScheduler, ExecutionResult, ResultKind, SyncItem};
pub use status::{ErrorRecord, RepoStatus, RepoTask, StatusListener, StatusReporter, TaskStore};
