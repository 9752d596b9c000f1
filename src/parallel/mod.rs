//! Parallel execution of repository operations.

pub mod scheduler;

pub use scheduler::{BoundedScheduler, ExecutionResult, ResultKind, SyncItem};
