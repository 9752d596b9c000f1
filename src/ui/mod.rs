//! Terminal status display for pull-all.
//!
//! # Overview
//!
//! The display consists of:
//! - **TerminalOutput**: the relative cursor primitives everything is drawn with
//! - **line**: status line layout, truncation and padding
//! - **progress**: the segmented progress bar and its legend
//! - **StatusRenderer**: append-only or windowed drawing of the task store
//! - **RenderLoop**: the tick driving windowed redraws
//! - **SummaryReporter**: the error list and category counts printed at the end
//!
//! # Example
//!
//! ```ignore
//! use pull_all::ui::{RenderConfig, RenderLoop, StatusRenderer};
//!
//! let config = RenderConfig::new(8, true, pull_all::ui::detect_interactive());
//! let renderer = Arc::new(StatusRenderer::new(config, Arc::clone(&store)));
//! let render_loop = RenderLoop::start(Arc::clone(&renderer), Duration::from_millis(100));
//!
//! // ... run the scheduler with `renderer` as its listener ...
//!
//! if let Some(render_loop) = render_loop {
//!     render_loop.finish().await?;
//! }
//! ```

pub mod line;
pub mod progress;
pub mod renderer;
pub mod summary;
pub mod terminal;

pub use line::{format_status_line, truncate_message, LineLayout, Palette};
pub use progress::{render_progress_bar, StatusCounts};
pub use renderer::{
    detect_interactive, terminal_size, window_size, PassStats, RenderConfig, RenderLoop,
    RenderMode, StatusRenderer,
};
pub use summary::{SummaryCounts, SummaryReporter};
pub use terminal::{AnsiTerminal, CaptureTerminal, TerminalOp, TerminalOutput};
