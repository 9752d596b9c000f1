//! Bounded concurrent scheduler for repository operations.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::status::{RepoStatus, StatusListener, StatusReporter, TaskStore};

/// Anything the scheduler can drive: it only needs a unique name.
pub trait SyncItem {
    fn name(&self) -> &str;
}

impl SyncItem for String {
    fn name(&self) -> &str {
        self
    }
}

/// What an operation ended up doing to a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Cloned,
    Pulled,
    PulledDefault,
    MergedFromDefault,
    UpToDateWithDefault,
    Deleted,
    Skipped,
    Uncommitted,
    MergeConflict,
    Clone,
    Pull,
    Delete,
    /// The operation itself errored or panicked.
    Error,
}

impl ResultKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            ResultKind::Cloned => "cloned",
            ResultKind::Pulled => "pulled",
            ResultKind::PulledDefault => "pulled_default",
            ResultKind::MergedFromDefault => "merged_from_default",
            ResultKind::UpToDateWithDefault => "up_to_date_with_default",
            ResultKind::Deleted => "deleted",
            ResultKind::Skipped => "skipped",
            ResultKind::Uncommitted => "uncommitted",
            ResultKind::MergeConflict => "merge_conflict",
            ResultKind::Clone => "clone",
            ResultKind::Pull => "pull",
            ResultKind::Delete => "delete",
            ResultKind::Error => "error",
        }
    }
}

/// Outcome of one operation, as handed back to the caller of [`BoundedScheduler::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub kind: ResultKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ExecutionResult {
    pub fn ok(kind: ResultKind) -> Self {
        Self {
            success: true,
            kind,
            error: None,
            details: None,
        }
    }

    pub fn failed(kind: ResultKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            kind,
            error: Some(error.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Drives a list of items through an async operation with at most
/// `concurrency` operations in flight.
///
/// A concurrency of 1 runs items strictly in order on the calling task.
/// Failures, including panics, are confined to the item that produced them.
pub struct BoundedScheduler {
    concurrency: usize,
    store: Arc<TaskStore>,
    listener: Option<Arc<dyn StatusListener>>,
}

impl BoundedScheduler {
    pub fn new(concurrency: usize, store: Arc<TaskStore>) -> SyncResult<Self> {
        if concurrency == 0 {
            return Err(SyncError::InvalidConfig(
                "Thread count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            concurrency,
            store,
            listener: None,
        })
    }

    /// Forward every applied status change to `listener`.
    pub fn with_listener(mut self, listener: Arc<dyn StatusListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn is_sequential(&self) -> bool {
        self.concurrency == 1
    }

    /// Build the status reporter handed to the operation for `name`.
    pub fn reporter_for(&self, name: &str) -> StatusReporter {
        StatusReporter::new(name, Arc::clone(&self.store), self.listener.clone())
    }

    /// Run `operation` over every item and return one result per item, in
    /// submission order.
    pub async fn run<I, F, Fut>(&self, items: Vec<I>, operation: F) -> Vec<ExecutionResult>
    where
        I: SyncItem + Send + 'static,
        F: Fn(I, StatusReporter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SyncResult<ExecutionResult>> + Send + 'static,
    {
        debug!(
            items = items.len(),
            concurrency = self.concurrency,
            "starting scheduler"
        );

        if self.is_sequential() {
            let mut results = Vec::with_capacity(items.len());
            for item in items {
                let reporter = self.reporter_for(item.name());
                results.push(execute_guarded(&operation, item, reporter).await);
            }
            return results;
        }

        let total = items.len();
        let operation = Arc::new(operation);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            // Waits here until an in-flight operation releases its permit.
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let reporter = self.reporter_for(item.name());
            let operation = Arc::clone(&operation);
            debug!(index, name = item.name(), "dispatching");

            join_set.spawn(async move {
                let result = execute_guarded(operation.as_ref(), item, reporter).await;
                drop(permit);
                (index, result)
            });
        }

        let mut slots: Vec<Option<ExecutionResult>> = vec![None; total];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(err) => warn!("scheduler task did not complete: {}", err),
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    ExecutionResult::failed(ResultKind::Error, "operation did not complete")
                })
            })
            .collect()
    }
}

/// Run one operation, turning errors and panics into a failed result.
async fn execute_guarded<I, F, Fut>(
    operation: &F,
    item: I,
    reporter: StatusReporter,
) -> ExecutionResult
where
    F: Fn(I, StatusReporter) -> Fut,
    Fut: Future<Output = SyncResult<ExecutionResult>>,
{
    let guarded = AssertUnwindSafe(async { operation(item, reporter.clone()).await });

    let error = match guarded.catch_unwind().await {
        Ok(Ok(result)) => return result,
        Ok(Err(err)) => err.to_string(),
        Err(panic) => panic_message(panic.as_ref()),
    };

    debug!(name = reporter.name(), %error, "operation failed unexpectedly");
    reporter.report(RepoStatus::Failed, format!("Unexpected error: {}", error));
    ExecutionResult::failed(ResultKind::Error, error)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "operation panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn names(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("repo-{:02}", i)).collect()
    }

    fn store_for(items: &[String]) -> Arc<TaskStore> {
        let store = Arc::new(TaskStore::new());
        for name in items {
            store.add_item(name.clone());
        }
        store
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let store = Arc::new(TaskStore::new());
        assert!(matches!(
            BoundedScheduler::new(0, store),
            Err(SyncError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_sequential_flag() {
        let store = Arc::new(TaskStore::new());
        assert!(BoundedScheduler::new(1, Arc::clone(&store))
            .unwrap()
            .is_sequential());
        assert!(!BoundedScheduler::new(4, store).unwrap().is_sequential());
    }

    #[tokio::test]
    async fn test_sequential_runs_in_order() {
        let items = names(4);
        let store = store_for(&items);
        let scheduler = BoundedScheduler::new(1, Arc::clone(&store)).unwrap();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let seen = Arc::clone(&order);
        let results = scheduler
            .run(items.clone(), move |item, reporter| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().unwrap().push(item.clone());
                    reporter.report(RepoStatus::Success, "Successfully pulled");
                    Ok(ExecutionResult::ok(ResultKind::Pulled))
                }
            })
            .await;

        assert_eq!(results.len(), 4);
        assert_eq!(*order.lock().unwrap(), items);
        assert!(store
            .snapshot()
            .iter()
            .all(|t| t.status == RepoStatus::Success));
    }

    #[tokio::test]
    async fn test_results_keep_submission_order() {
        let items = names(6);
        let store = store_for(&items);
        let scheduler = BoundedScheduler::new(3, store).unwrap();

        // Earlier items sleep longer so they finish last.
        let results = scheduler
            .run(items, |item, _reporter| async move {
                let index: u64 = item[5..].parse().unwrap();
                tokio::time::sleep(Duration::from_millis(60 - index * 10)).await;
                Ok(ExecutionResult::ok(ResultKind::Pulled)
                    .with_details(serde_json::json!({ "name": item })))
            })
            .await;

        let order: Vec<String> = results
            .iter()
            .map(|r| r.details.as_ref().unwrap()["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(order, names(6));
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_limit() {
        let items = names(20);
        let store = store_for(&items);
        let scheduler = BoundedScheduler::new(4, store).unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (current, max) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let results = scheduler
            .run(items, move |_item, _reporter| {
                let current = Arc::clone(&current);
                let max = Arc::clone(&max);
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    max.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(ExecutionResult::ok(ResultKind::Cloned))
                }
            })
            .await;

        assert_eq!(results.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert!(peak.load(Ordering::SeqCst) >= 2);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_error_is_converted_and_pool_continues() {
        let items = names(5);
        let store = store_for(&items);
        let scheduler = BoundedScheduler::new(2, Arc::clone(&store)).unwrap();

        let results = scheduler
            .run(items, |item, reporter| async move {
                if item == "repo-01" {
                    return Err(SyncError::InvalidConfig("bad input".to_string()));
                }
                reporter.report(RepoStatus::Success, "Successfully cloned");
                Ok(ExecutionResult::ok(ResultKind::Cloned))
            })
            .await;

        assert_eq!(results.len(), 5);
        assert!(!results[1].success);
        assert_eq!(results[1].kind, ResultKind::Error);
        assert!(results.iter().filter(|r| r.success).count() == 4);

        let failed = store.get("repo-01").unwrap();
        assert_eq!(failed.status, RepoStatus::Failed);
        assert!(failed.message.starts_with("Unexpected error:"));
        assert_eq!(failed.error_number, Some(1));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let items = names(3);
        let store = store_for(&items);
        let scheduler = BoundedScheduler::new(2, Arc::clone(&store)).unwrap();

        let results = scheduler
            .run(items, |item, _reporter| async move {
                if item == "repo-00" {
                    panic!("exploded");
                }
                Ok(ExecutionResult::ok(ResultKind::Pulled))
            })
            .await;

        assert_eq!(results[0].kind, ResultKind::Error);
        assert_eq!(results[0].error.as_deref(), Some("exploded"));
        assert!(results[1].success && results[2].success);
        assert_eq!(store.get("repo-00").unwrap().status, RepoStatus::Failed);
    }

    #[tokio::test]
    async fn test_sequential_panic_is_contained() {
        let items = names(2);
        let store = store_for(&items);
        let scheduler = BoundedScheduler::new(1, store).unwrap();

        let results = scheduler
            .run(items, |item, _reporter| async move {
                if item == "repo-00" {
                    panic!("{} exploded", item);
                }
                Ok(ExecutionResult::ok(ResultKind::Pulled))
            })
            .await;

        assert_eq!(results[0].error.as_deref(), Some("repo-00 exploded"));
        assert!(results[1].success);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let store = Arc::new(TaskStore::new());
        let scheduler = BoundedScheduler::new(8, store).unwrap();
        let results = scheduler
            .run(Vec::<String>::new(), |_item, _reporter| async move {
                Ok(ExecutionResult::ok(ResultKind::Pulled))
            })
            .await;
        assert!(results.is_empty());
    }

    #[test]
    fn test_result_kind_labels() {
        assert_eq!(ResultKind::MergedFromDefault.as_label(), "merged_from_default");
        assert_eq!(ResultKind::Error.as_label(), "error");
    }

    #[test]
    fn test_execution_result_serialization_skips_empty_fields() {
        let json = serde_json::to_value(ExecutionResult::ok(ResultKind::Cloned)).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "kind": "cloned" }));

        let json =
            serde_json::to_value(ExecutionResult::failed(ResultKind::Pull, "boom")).unwrap();
        assert_eq!(json["error"], "boom");
    }
}
