//! Status line formatting.

use std::time::{Duration, Instant};

use console::Style;

use crate::status::{RepoStatus, RepoTask};

/// Width of the right-aligned duration column.
pub const DURATION_WIDTH: usize = 6;

/// Columns kept free on the right of every message.
const SAFETY_MARGIN: usize = 10;

/// Messages are never squeezed below this many columns.
const MIN_MESSAGE_WIDTH: usize = 20;

/// Colors used by status lines, legend and progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    colors: bool,
}

impl Palette {
    pub fn new(colors: bool) -> Self {
        Self { colors }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    pub fn colors_enabled(&self) -> bool {
        self.colors
    }

    fn style(&self, style: Style) -> Style {
        style.force_styling(self.colors)
    }

    pub fn status(&self, status: RepoStatus) -> Style {
        let style = match status {
            RepoStatus::Pending => Style::new().dim(),
            RepoStatus::Cloning
            | RepoStatus::Pulling
            | RepoStatus::Checking
            | RepoStatus::Deleting => Style::new().cyan(),
            RepoStatus::Success => Style::new().green(),
            RepoStatus::Failed => Style::new().red(),
            RepoStatus::Skipped | RepoStatus::Uncommitted => Style::new().yellow(),
        };
        self.style(style)
    }

    pub fn dim(&self) -> Style {
        self.style(Style::new().dim())
    }

    pub fn bold(&self) -> Style {
        self.style(Style::new().bold())
    }

    pub fn green(&self) -> Style {
        self.style(Style::new().green())
    }

    pub fn red(&self) -> Style {
        self.style(Style::new().red())
    }

    pub fn yellow(&self) -> Style {
        self.style(Style::new().yellow())
    }

    pub fn cyan(&self) -> Style {
        self.style(Style::new().cyan())
    }

    pub fn blue(&self) -> Style {
        self.style(Style::new().blue())
    }
}

/// Column geometry shared by every line of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineLayout {
    pub term_width: usize,
    pub name_width: usize,
}

impl LineLayout {
    pub fn new(term_width: usize, name_width: usize) -> Self {
        Self {
            term_width,
            name_width,
        }
    }

    /// Columns left for the message after icon, name and duration.
    pub fn message_width(&self) -> usize {
        let base = 2 + 1 + self.name_width + 1 + DURATION_WIDTH + 1;
        self.term_width
            .saturating_sub(base)
            .saturating_sub(SAFETY_MARGIN)
            .max(MIN_MESSAGE_WIDTH)
    }
}

/// Cut `message` to at most `max_len` characters, ending in `...` when cut.
pub fn truncate_message(message: &str, max_len: usize) -> String {
    if message.chars().count() <= max_len {
        return message.to_string();
    }
    let kept: String = message.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Number of terminal columns `text` occupies, ignoring ANSI sequences.
pub fn visible_width(text: &str) -> usize {
    console::measure_text_width(text)
}

pub fn format_duration(duration: Duration) -> String {
    format!("{:.1}s", duration.as_secs_f64())
}

/// Message column for `task`.
///
/// Failed repositories show their error number so the full text can be
/// looked up in the error list printed after the run. The text after the
/// number is the message recorded under it, even after a later failure.
pub fn display_message(task: &RepoTask, available: usize, use_default: bool) -> String {
    if let (RepoStatus::Failed, Some(number)) = (task.status, task.error_number) {
        let recorded = task.recorded_error.as_deref().unwrap_or(&task.message);
        return format!(
            "Error #{}: {}",
            number,
            truncate_message(recorded, available.saturating_sub(10))
        );
    }

    let message = if task.message.is_empty() && use_default {
        task.status.default_message()
    } else {
        task.message.as_str()
    };
    truncate_message(message, available)
}

/// Build one padded status line.
///
/// The result fills exactly `term_width - 1` visible columns so that
/// rewriting it in place leaves no residue and never wraps, even when the
/// message floor would push it past the edge of a narrow terminal.
pub fn format_status_line(
    task: &RepoTask,
    now: Instant,
    layout: &LineLayout,
    palette: &Palette,
    use_default: bool,
) -> String {
    let duration = format_duration(task.elapsed(now));
    let message = display_message(task, layout.message_width(), use_default);
    let line = format!(
        "{} {} {} {}",
        palette.status(task.status).apply_to(task.status.icon()),
        palette
            .status(task.status)
            .apply_to(format!("{:<width$}", task.name, width = layout.name_width)),
        palette
            .dim()
            .apply_to(format!("{:>width$}", duration, width = DURATION_WIDTH)),
        message
    );
    pad_to_width(line, layout.term_width.saturating_sub(1))
}

/// Right-pad `line` with spaces to exactly `width` visible columns,
/// clipping it first when it is wider.
pub fn pad_to_width(line: String, width: usize) -> String {
    let mut line = clip_to_width(line, width);
    let visible = visible_width(&line);
    if visible < width {
        line.push_str(&" ".repeat(width - visible));
    }
    line
}

/// Cut `line` to at most `width` visible columns, keeping ANSI sequences.
pub fn clip_to_width(line: String, width: usize) -> String {
    if visible_width(&line) <= width {
        return line;
    }
    console::truncate_str(&line, width, "").into_owned()
}
