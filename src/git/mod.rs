//! Repository operations over the `git` command line.
//!
//! Each git invocation is bounded by a timeout; a command that runs too long
//! is killed and reported like any other git failure.

pub mod command;
pub mod ops;

pub use command::{GitCli, GitOutput};
pub use ops::{
    guess_default_branch, is_already_up_to_date, parse_remote_branches, parse_remote_head,
    RepoExecutor, SyncOptions,
};
