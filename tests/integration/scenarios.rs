//! End-to-end scenarios for the scheduler, task store and renderer.
//!
//! Operations are simulated so these run without git or network access;
//! terminal output is captured and inspected primitive by primitive.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pull_all::ui::line::display_message;
use pull_all::ui::{
    truncate_message, window_size, CaptureTerminal, RenderConfig, RenderMode, StatusRenderer,
    SummaryReporter, TerminalOp,
};
use pull_all::{
    BoundedScheduler, ExecutionResult, RepoStatus, ResultKind, StatusListener, TaskStore,
};

const LONG_ERROR: &str =
    "Error: configuration specifies to merge with ref main but no ref was fetched";

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

fn render_config(concurrency: usize, width: usize, height: usize) -> RenderConfig {
    RenderConfig {
        concurrency,
        live_updates: true,
        interactive: true,
        term_width: width,
        term_height: height,
    }
}

fn renderer_for(
    store: &Arc<TaskStore>,
    config: RenderConfig,
) -> (Arc<StatusRenderer>, CaptureTerminal) {
    let capture = CaptureTerminal::new();
    let renderer = Arc::new(StatusRenderer::with_output(
        config,
        Arc::clone(store),
        Box::new(capture.clone()),
    ));
    (renderer, capture)
}

#[tokio::test]
async fn test_sequential_run_appends_one_line_per_repository() {
    let items = names(3);
    let store = store_for(&items);
    let (renderer, capture) = renderer_for(&store, render_config(1, 80, 24));
    assert_eq!(renderer.mode(), RenderMode::AppendOnly);

    let listener: Arc<dyn StatusListener> = renderer.clone();
    let scheduler = BoundedScheduler::new(1, Arc::clone(&store))
        .unwrap()
        .with_listener(listener);

    let results = scheduler
        .run(items, |_item, reporter| async move {
            reporter.report(RepoStatus::Pulling, "Checking status...");
            reporter.report(RepoStatus::Pulling, "Fetching all branches...");
            reporter.report(RepoStatus::Success, "Successfully pulled");
            Ok(ExecutionResult::ok(ResultKind::Pulled))
        })
        .await;

    assert_eq!(results.len(), 3);
    let lines = capture.lines();
    assert_eq!(lines.len(), 3);
    for (line, name) in lines.iter().zip(names(3)) {
        assert!(line.contains(&name));
        assert!(line.contains("Successfully pulled"));
    }
    assert!(!capture.has_cursor_control());
}

#[tokio::test]
async fn test_windowed_run_on_short_terminal_stays_within_height() {
    const HEIGHT: usize = 10;
    let items = names(50);
    let store = store_for(&items);
    let (renderer, capture) = renderer_for(&store, render_config(8, 100, HEIGHT));
    assert_eq!(renderer.mode(), RenderMode::Windowed);
    assert_eq!(window_size(8, HEIGHT), 2);

    let scheduler = BoundedScheduler::new(8, Arc::clone(&store)).unwrap();
    let run = tokio::spawn(async move {
        scheduler
            .run(items, |item, reporter| async move {
                reporter.report(RepoStatus::Cloning, "Cloning...");
                tokio::time::sleep(Duration::from_millis(3)).await;
                if item.ends_with('7') {
                    reporter.report(RepoStatus::Failed, "Error: remote hung up");
                    return Ok(ExecutionResult::failed(ResultKind::Clone, "remote hung up"));
                }
                reporter.report(RepoStatus::Success, "Successfully cloned");
                Ok(ExecutionResult::ok(ResultKind::Cloned))
            })
            .await
    });

    let mut passes = vec![renderer.render().unwrap()];
    while !run.is_finished() {
        tokio::time::sleep(Duration::from_millis(1)).await;
        passes.push(renderer.render().unwrap());
    }
    let results = run.await.unwrap();
    passes.push(renderer.render().unwrap());

    assert_eq!(results.len(), 50);
    assert_eq!(passes[0].moved_up, 0);
    for pair in passes.windows(2) {
        assert_eq!(pair[1].moved_up, pair[0].region_lines);
    }
    for pass in &passes {
        assert!(pass.window_lines <= 2);
        assert!(pass.region_lines <= HEIGHT);
        assert!(pass.moved_up <= HEIGHT);
    }
    assert!(capture
        .ops()
        .iter()
        .all(|op| !matches!(op, TerminalOp::MoveUp(n) if *n > HEIGHT)));

    // Every repository is committed to scrollback exactly once.
    let committed: usize = passes.iter().map(|p| p.committed_lines).sum();
    assert_eq!(committed, 50);
}

#[test]
fn test_repeated_failure_keeps_first_error_number() {
    let store = TaskStore::new();
    store.add_item("repo-a");
    store.add_item("repo-x");

    store.update("repo-a", RepoStatus::Failed, "Error: first");
    store.update("repo-x", RepoStatus::Failed, "Error: original");
    store.update("repo-x", RepoStatus::Success, "Successfully pulled");
    store.update("repo-x", RepoStatus::Failed, "Error: second attempt");

    let task = store.get("repo-x").unwrap();
    assert_eq!(task.error_number, Some(2));

    let errors = store.errors();
    let for_x: Vec<_> = errors.iter().filter(|e| e.name == "repo-x").collect();
    assert_eq!(for_x.len(), 1);
    assert_eq!(for_x[0].number, 2);
    assert_eq!(for_x[0].message, "Error: original");
    assert_eq!(
        display_message(&task, 60, false),
        "Error #2: Error: original"
    );
}

#[test]
fn test_long_error_truncated_in_line_but_complete_in_summary() {
    let truncated = truncate_message(LONG_ERROR, 20);
    assert_eq!(truncated.chars().count(), 20);
    assert!(truncated.ends_with("..."));

    let store = TaskStore::new();
    store.add_item("repo-x");
    store.update("repo-x", RepoStatus::Failed, LONG_ERROR);
    let task = store.get("repo-x").unwrap();

    let short = display_message(&task, 30, false);
    assert_eq!(short, format!("Error #1: {}", truncated));

    let summary = SummaryReporter::new(&store, 80, pull_all::ui::Palette::plain());
    let listed = summary.lines();
    assert!(listed.contains(&format!("# 1 repo-x: {}", LONG_ERROR)));
}

#[test]
fn test_error_numbers_resolve_to_error_list() {
    let store = TaskStore::new();
    for name in names(5) {
        store.add_item(name);
    }
    for (index, name) in names(5).iter().enumerate().rev() {
        if index % 2 == 0 {
            store.update(name, RepoStatus::Failed, format!("Error: failure {}", index));
        }
    }

    let errors = store.errors();
    for task in store.snapshot() {
        if let Some(number) = task.error_number {
            let record = errors.iter().find(|e| e.number == number).unwrap();
            assert_eq!(record.name, task.name);
            assert_eq!(record.message, task.message);
            assert!(display_message(&task, 60, false).starts_with(&format!("Error #{}:", number)));
        }
    }
    assert_eq!(errors.len(), 3);
}

#[test]
fn test_completed_run_shows_full_progress_bar() {
    let items = names(7);
    let store = store_for(&items);
    let (renderer, capture) = renderer_for(&store, render_config(4, 120, 30));

    renderer.render().unwrap();
    for (index, name) in items.iter().enumerate() {
        store.update(name, RepoStatus::Success, "Successfully cloned");
        if index == 2 {
            renderer.render().unwrap();
        }
    }
    capture.clear();
    renderer.render().unwrap();

    let bar = capture
        .lines()
        .into_iter()
        .find(|line| line.starts_with('['))
        .unwrap();
    assert!(!bar.contains('░'));
    assert_eq!(bar.matches('█').count(), 50);
    assert!(bar.ends_with("7/7 (100%)"));
}

#[tokio::test]
async fn test_results_match_input_order_for_any_concurrency() {
    for concurrency in [1, 2, 16] {
        let items = names(12);
        let store = store_for(&items);
        let scheduler = BoundedScheduler::new(concurrency, store).unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (current, max) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let results = scheduler
            .run(items.clone(), move |item, _reporter| {
                let current = Arc::clone(&current);
                let max = Arc::clone(&max);
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    max.fetch_max(now, Ordering::SeqCst);
                    let index: u64 = item[5..].parse().unwrap();
                    tokio::time::sleep(Duration::from_millis(24 - index * 2)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(ExecutionResult::ok(ResultKind::Pulled)
                        .with_details(serde_json::json!({ "name": item })))
                }
            })
            .await;

        assert_eq!(results.len(), items.len());
        let order: Vec<&str> = results
            .iter()
            .map(|r| r.details.as_ref().unwrap()["name"].as_str().unwrap())
            .collect();
        assert_eq!(order, items.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= concurrency);
    }
}
