use std::fmt;
use std::sync::Arc;

use super::{RepoStatus, StatusChange, TaskStore};

/// Callback for observing status transitions as they are applied.
pub trait StatusListener: Send + Sync {
    fn on_status_change(&self, change: &StatusChange);
}

/// Status reporting capability bound to a single repository.
///
/// Every report goes through [`TaskStore::update`] and, when it lands, is
/// forwarded to the listener before `report` returns.
#[derive(Clone)]
pub struct StatusReporter {
    name: Arc<str>,
    store: Arc<TaskStore>,
    listener: Option<Arc<dyn StatusListener>>,
}

impl fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusReporter")
            .field("name", &self.name)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl StatusReporter {
    pub fn new(
        name: impl Into<Arc<str>>,
        store: Arc<TaskStore>,
        listener: Option<Arc<dyn StatusListener>>,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            listener,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn report(&self, status: RepoStatus, message: impl Into<String>) {
        if let Some(change) = self.store.update(&self.name, status, message) {
            if let Some(listener) = &self.listener {
                listener.on_status_change(&change);
            }
        }
    }
}
