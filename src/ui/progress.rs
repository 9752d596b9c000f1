//! Progress bar synthesis.

use crate::status::{RepoStatus, RepoTask};
use crate::ui::line::Palette;

/// The bar never grows wider than this.
pub const MAX_BAR_WIDTH: usize = 50;

/// Columns reserved for the counts text next to the bar.
const TEXT_RESERVE: usize = 40;

/// Number of repositories per progress category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub success: usize,
    pub failed: usize,
    /// Skipped and uncommitted repositories.
    pub skipped: usize,
    pub in_progress: usize,
    pub pending: usize,
}

impl StatusCounts {
    pub fn from_tasks(tasks: &[RepoTask]) -> Self {
        let mut counts = Self::default();
        for task in tasks {
            match task.status {
                RepoStatus::Success => counts.success += 1,
                RepoStatus::Failed => counts.failed += 1,
                RepoStatus::Skipped | RepoStatus::Uncommitted => counts.skipped += 1,
                RepoStatus::Checking
                | RepoStatus::Cloning
                | RepoStatus::Pulling
                | RepoStatus::Deleting => counts.in_progress += 1,
                RepoStatus::Pending => counts.pending += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.success + self.failed + self.skipped + self.in_progress + self.pending
    }

    pub fn completed(&self) -> usize {
        self.success + self.failed + self.skipped
    }

    /// Completed share, rounded to a whole percent.
    pub fn percentage(&self) -> usize {
        match self.total() {
            0 => 0,
            total => (self.completed() * 200 + total) / (total * 2),
        }
    }
}

/// Character widths of each bar segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BarSegments {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub in_progress: usize,
    pub pending: usize,
}

impl BarSegments {
    pub fn width(&self) -> usize {
        self.success + self.failed + self.skipped + self.in_progress + self.pending
    }
}

/// Bar width for a terminal `term_width` columns wide.
pub fn bar_width(term_width: usize) -> usize {
    MAX_BAR_WIDTH.min(term_width.saturating_sub(TEXT_RESERVE))
}

/// `count / total * width`, rounded half up.
fn scaled(count: usize, total: usize, width: usize) -> usize {
    (count * width * 2 + total) / (total * 2)
}

/// Split `width` characters between the categories in `counts`.
///
/// Segments always sum to exactly `width`. Rounding overflow is taken back
/// from the in-progress, skipped, failed and success segments in that order;
/// any shortfall goes to pending, or to success once everything completed.
pub fn compute_segments(counts: &StatusCounts, width: usize) -> BarSegments {
    let total = counts.total();
    if total == 0 {
        return BarSegments {
            pending: width,
            ..BarSegments::default()
        };
    }

    let mut segments = BarSegments {
        success: scaled(counts.success, total, width),
        failed: scaled(counts.failed, total, width),
        skipped: scaled(counts.skipped, total, width),
        in_progress: scaled(counts.in_progress, total, width),
        pending: 0,
    };

    let mut overflow = segments.width().saturating_sub(width);
    for segment in [
        &mut segments.in_progress,
        &mut segments.skipped,
        &mut segments.failed,
        &mut segments.success,
    ] {
        let taken = overflow.min(*segment);
        *segment -= taken;
        overflow -= taken;
    }

    let remainder = width - segments.width();
    if counts.completed() == total {
        segments.success += remainder;
    } else {
        segments.pending = remainder;
    }
    segments
}

/// Render `[bar] done/total (pct%)` with an error count when anything failed.
///
/// Returns `None` when there is nothing to track.
pub fn render_progress_bar(
    counts: &StatusCounts,
    term_width: usize,
    palette: &Palette,
) -> Option<String> {
    let total = counts.total();
    if total == 0 {
        return None;
    }

    let segments = compute_segments(counts, bar_width(term_width));
    let bar = format!(
        "{}{}{}{}{}",
        palette.green().apply_to("█".repeat(segments.success)),
        palette.red().apply_to("█".repeat(segments.failed)),
        palette.yellow().apply_to("█".repeat(segments.skipped)),
        palette.cyan().apply_to("█".repeat(segments.in_progress)),
        palette.dim().apply_to("░".repeat(segments.pending)),
    );

    let mut rendered = format!(
        "[{}] {}/{} ({}%)",
        bar,
        counts.completed(),
        total,
        counts.percentage()
    );
    if counts.failed > 0 {
        rendered.push(' ');
        rendered.push_str(
            &palette
                .red()
                .apply_to(format!("{} errors", counts.failed))
                .to_string(),
        );
    }
    Some(rendered)
}

/// Legend explaining the bar colors.
pub fn render_legend(palette: &Palette) -> String {
    format!(
        "{}{}{}{}{}{}{}{}{}",
        palette.dim().apply_to("Progress: "),
        palette.green().apply_to("█"),
        palette.dim().apply_to("=success "),
        palette.red().apply_to("█"),
        palette.dim().apply_to("=failed "),
        palette.yellow().apply_to("█"),
        palette.dim().apply_to("=skipped "),
        palette.cyan().apply_to("█"),
        palette.dim().apply_to("=in progress ░=pending"),
    )
}
