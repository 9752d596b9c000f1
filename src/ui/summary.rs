//! End-of-run summary.

use std::io;
use std::time::Duration;

use crate::status::{ErrorRecord, RepoStatus, RepoTask, TaskStore};
use crate::ui::line::{format_duration, Palette};
use crate::ui::terminal::TerminalOutput;

/// Final tallies, split by what the success and failure messages say.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryCounts {
    pub cloned: usize,
    pub pulled: usize,
    pub merged_from_default: usize,
    pub up_to_date_with_default: usize,
    pub deleted: usize,
    pub uncommitted: usize,
    pub skipped: usize,
    pub merge_conflicts: usize,
    pub failed: usize,
}

impl SummaryCounts {
    pub fn from_tasks(tasks: &[RepoTask]) -> Self {
        let mut counts = Self::default();
        for task in tasks {
            let message = task.message.as_str();
            match task.status {
                RepoStatus::Success => {
                    if message.contains("cloned") {
                        counts.cloned += 1;
                    } else if message.contains("merged") && message.contains("into") {
                        counts.merged_from_default += 1;
                    } else if message.contains("up to date with") {
                        counts.up_to_date_with_default += 1;
                    } else if message.contains("pulled") {
                        counts.pulled += 1;
                    } else if message.contains("deleted") {
                        counts.deleted += 1;
                    } else if message.contains("uncommitted") {
                        counts.uncommitted += 1;
                    }
                }
                RepoStatus::Failed => {
                    if message.contains("Merge conflict") {
                        counts.merge_conflicts += 1;
                    } else {
                        counts.failed += 1;
                    }
                }
                RepoStatus::Skipped => counts.skipped += 1,
                RepoStatus::Uncommitted => counts.uncommitted += 1,
                _ => {}
            }
        }
        counts
    }
}

/// Prints the error list, category counts and total time once a run is over.
pub struct SummaryReporter {
    tasks: Vec<RepoTask>,
    errors: Vec<ErrorRecord>,
    elapsed: Duration,
    term_width: usize,
    palette: Palette,
}

impl SummaryReporter {
    pub fn new(store: &TaskStore, term_width: usize, palette: Palette) -> Self {
        Self {
            tasks: store.snapshot(),
            errors: store.errors(),
            elapsed: store.elapsed(),
            term_width,
            palette,
        }
    }

    pub fn counts(&self) -> SummaryCounts {
        SummaryCounts::from_tasks(&self.tasks)
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Lines of the summary, without trailing newlines.
    pub fn lines(&self) -> Vec<String> {
        let p = &self.palette;
        let mut lines = Vec::new();

        if !self.errors.is_empty() {
            lines.push(String::new());
            lines.push(p.red().bold().apply_to("❌ Errors:").to_string());
            lines.push(
                p.dim()
                    .apply_to("─".repeat(self.term_width.min(80)))
                    .to_string(),
            );
            for error in &self.errors {
                lines.push(format!(
                    "{} {}: {}",
                    p.red().apply_to(format!("#{:>2}", error.number)),
                    p.yellow().apply_to(&error.name),
                    error.message
                ));
            }
        }

        let counts = self.counts();
        lines.push(String::new());
        lines.push(p.blue().bold().apply_to("📊 Summary:").to_string());

        let categories = [
            (counts.cloned, "✅ Cloned", p.green()),
            (counts.pulled, "✅ Pulled", p.green()),
            (counts.merged_from_default, "🔀 Merged from default branch", p.green()),
            (counts.up_to_date_with_default, "✅ Up to date with default", p.green()),
            (counts.deleted, "✅ Deleted", p.green()),
            (counts.uncommitted, "🔄 Uncommitted changes", p.yellow()),
            (counts.skipped, "⚠️  Skipped", p.yellow()),
            (counts.merge_conflicts, "💥 Merge conflicts", p.red()),
            (counts.failed, "❌ Failed", p.red()),
        ];
        for (count, label, style) in categories {
            if count > 0 {
                lines.push(style.apply_to(format!("{}: {}", label, count)).to_string());
            }
        }

        lines.push(
            p.blue()
                .apply_to(format!("⏱️  Total time: {}", format_duration(self.elapsed)))
                .to_string(),
        );
        lines.push(p.blue().apply_to("🎉 Operation completed!").to_string());
        lines
    }

    pub fn print(&self, out: &mut dyn TerminalOutput) -> io::Result<()> {
        for line in self.lines() {
            out.write_line(&line)?;
        }
        out.flush()
    }
}
