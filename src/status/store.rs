use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{ErrorRecord, RepoStatus, RepoTask};

/// Result of a successful update: the record after the change and the
/// status it had before.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub task: RepoTask,
    pub previous: RepoStatus,
}

#[derive(Debug, Default)]
struct StoreInner {
    tasks: BTreeMap<String, RepoTask>,
    errors: Vec<ErrorRecord>,
    error_counter: u32,
    max_name_len: usize,
}

/// Name-ordered store of repository status records.
///
/// The scheduler (through [`StatusReporter`](super::StatusReporter)) is the
/// only writer. Reads return owned snapshots so the renderer never holds the
/// lock while writing to the terminal.
#[derive(Debug)]
pub struct TaskStore {
    inner: Mutex<StoreInner>,
    created_at: Instant,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            created_at: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a repository as `Pending`.
    ///
    /// Registering the same name twice replaces the earlier record.
    pub fn add_item(&self, name: impl Into<String>) {
        let name = name.into();
        let mut inner = self.lock();
        inner.max_name_len = inner.max_name_len.max(name.chars().count());
        let task = RepoTask::new(name.clone(), Instant::now());
        inner.tasks.insert(name, task);
    }

    /// Apply a status transition decided by the caller.
    ///
    /// Returns `None` for names that were never registered. The first
    /// transition into `Failed` assigns the next error number and appends an
    /// [`ErrorRecord`]; later failures keep that number and message. The task
    /// carries the recorded message in `recorded_error` so its short form can
    /// show the same text the error list will.
    pub fn update(
        &self,
        name: &str,
        status: RepoStatus,
        message: impl Into<String>,
    ) -> Option<StatusChange> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let task = inner.tasks.get_mut(name)?;

        let previous = task.status;
        task.status = status;
        task.message = message.into();
        if status != RepoStatus::Pending {
            task.end_time = Some(Instant::now());
        }

        if status == RepoStatus::Failed && task.error_number.is_none() {
            inner.error_counter += 1;
            task.error_number = Some(inner.error_counter);
            task.recorded_error = Some(task.message.clone());
            inner.errors.push(ErrorRecord {
                number: inner.error_counter,
                name: task.name.clone(),
                message: task.message.clone(),
            });
        }

        Some(StatusChange {
            task: task.clone(),
            previous,
        })
    }

    /// All records ordered by name.
    pub fn snapshot(&self) -> Vec<RepoTask> {
        self.lock().tasks.values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<RepoTask> {
        self.lock().tasks.get(name).cloned()
    }

    /// Error records in the order the failures happened.
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.lock().errors.clone()
    }

    /// Length of the longest registered name, used for column alignment.
    pub fn max_name_len(&self) -> usize {
        self.lock().max_name_len
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wall time since the store was created.
    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }
}
