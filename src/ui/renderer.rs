//! Terminal status renderer.
//!
//! Two strategies, fixed when the renderer is built:
//!
//! - **Append-only**: one padded line per meaningful status change, never
//!   revisited. No cursor control is emitted, so output is safe to pipe.
//! - **Windowed**: a redraw pass on every tick. Repositories that reached a
//!   terminal status are printed once and left in scrollback; a bounded
//!   window of active repositories plus a legend and progress bar is
//!   rewritten in place.
//!
//! A windowed pass only ever moves the cursor up by the number of lines the
//! previous pass wrote into the rewritable region. Moving up by the total
//! repository count would be clamped by the terminal once the list is taller
//! than the screen, and every later pass would then duplicate lines.

use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::status::{RepoStatus, RepoTask, StatusChange, StatusListener, TaskStore};
use crate::ui::line::{clip_to_width, format_status_line, LineLayout, Palette};
use crate::ui::progress::{render_legend, render_progress_bar, StatusCounts};
use crate::ui::terminal::{AnsiTerminal, TerminalOutput};

/// Lines taken by the header printed before the first pass.
pub const HEADER_LINES: usize = 3;

/// Lines kept free for the separator, legend and progress bar.
pub const FOOTER_LINES: usize = 5;

/// Rows of the terminal that never hold windowed repository lines.
pub const RESERVED_LINES: usize = HEADER_LINES + FOOTER_LINES;

const DEFAULT_WIDTH: usize = 80;
const DEFAULT_HEIGHT: usize = 24;

/// Rendering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    AppendOnly,
    Windowed,
}

/// Inputs that decide how the renderer behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub concurrency: usize,
    pub live_updates: bool,
    /// Output is a terminal and not a CI log.
    pub interactive: bool,
    pub term_width: usize,
    pub term_height: usize,
}

impl RenderConfig {
    /// Build a config using the current terminal size.
    pub fn new(concurrency: usize, live_updates: bool, interactive: bool) -> Self {
        let (term_width, term_height) = terminal_size();
        Self {
            concurrency,
            live_updates,
            interactive,
            term_width,
            term_height,
        }
    }

    pub fn with_dimensions(mut self, width: usize, height: usize) -> Self {
        self.term_width = width;
        self.term_height = height;
        self
    }

    pub fn mode(&self) -> RenderMode {
        if self.live_updates && self.interactive && self.concurrency > 1 {
            RenderMode::Windowed
        } else {
            RenderMode::AppendOnly
        }
    }

    /// Whether append-only output should skip in-progress states and log
    /// only the final status of each repository.
    pub fn final_status_only(&self) -> bool {
        self.concurrency == 1 || !self.live_updates
    }
}

/// Current terminal size, falling back to 80x24.
pub fn terminal_size() -> (usize, usize) {
    match crossterm::terminal::size() {
        Ok((cols, rows)) if cols > 0 && rows > 0 => (cols as usize, rows as usize),
        _ => (DEFAULT_WIDTH, DEFAULT_HEIGHT),
    }
}

/// Whether stdout is a terminal outside of CI.
pub fn detect_interactive() -> bool {
    console::Term::stdout().is_term() && std::env::var_os("CI").is_none()
}

/// Number of active repositories shown in one windowed pass.
pub fn window_size(concurrency: usize, term_height: usize) -> usize {
    concurrency.min(term_height.saturating_sub(RESERVED_LINES).max(1))
}

/// Renderer-private bookkeeping between passes.
#[derive(Debug, Default)]
pub struct RenderState {
    /// Lines written into the rewritable region by the previous pass.
    pub last_rendered_lines: usize,
    pub header_printed: bool,
    pub rendered_once: bool,
    /// Repositories whose final line is already in scrollback.
    pub committed: HashSet<String>,
    pub term_width: usize,
    pub term_height: usize,
}

/// What one windowed pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Lines the cursor moved up before drawing.
    pub moved_up: usize,
    /// Final lines committed to scrollback in this pass.
    pub committed_lines: usize,
    /// Lines written into the rewritable region.
    pub region_lines: usize,
    /// Active repositories drawn in the window.
    pub window_lines: usize,
}

struct RendererInner {
    state: RenderState,
    out: Box<dyn TerminalOutput>,
}

/// Draws the task store to the terminal.
pub struct StatusRenderer {
    mode: RenderMode,
    config: RenderConfig,
    store: Arc<TaskStore>,
    palette: Palette,
    inner: Mutex<RendererInner>,
}

impl StatusRenderer {
    /// Renderer writing to stdout, colored when interactive.
    pub fn new(config: RenderConfig, store: Arc<TaskStore>) -> Self {
        let palette = Palette::new(config.interactive);
        Self::with_output(config, store, Box::new(AnsiTerminal::stdout())).with_palette(palette)
    }

    /// Renderer writing to `out` without colors.
    pub fn with_output(
        config: RenderConfig,
        store: Arc<TaskStore>,
        out: Box<dyn TerminalOutput>,
    ) -> Self {
        let state = RenderState {
            term_width: config.term_width,
            term_height: config.term_height,
            ..RenderState::default()
        };
        Self {
            mode: config.mode(),
            config,
            store,
            palette: Palette::plain(),
            inner: Mutex::new(RendererInner { state, out }),
        }
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    fn lock(&self) -> MutexGuard<'_, RendererInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached terminal width and height.
    pub fn dimensions(&self) -> (usize, usize) {
        let inner = self.lock();
        (inner.state.term_width, inner.state.term_height)
    }

    /// Lines the next windowed pass will move up by.
    pub fn last_rendered_lines(&self) -> usize {
        self.lock().state.last_rendered_lines
    }

    pub fn committed_count(&self) -> usize {
        self.lock().state.committed.len()
    }

    /// Run one windowed redraw pass. Does nothing in append-only mode.
    pub fn render(&self) -> io::Result<PassStats> {
        if self.mode != RenderMode::Windowed {
            return Ok(PassStats::default());
        }

        let tasks = self.store.snapshot();
        let name_width = self.store.max_name_len();
        let now = Instant::now();

        let mut guard = self.lock();
        let RendererInner { state, out } = &mut *guard;

        if !state.header_printed {
            self.write_header(out.as_mut(), state.term_width)?;
            state.header_printed = true;
        }

        let mut active: Vec<&RepoTask> = Vec::new();
        let mut newly_terminal: Vec<&RepoTask> = Vec::new();
        for task in &tasks {
            if !task.status.is_terminal() {
                active.push(task);
            } else if !state.committed.contains(&task.name) {
                newly_terminal.push(task);
            }
        }
        for task in &newly_terminal {
            state.committed.insert(task.name.clone());
        }

        let window = window_size(self.config.concurrency, state.term_height);
        let layout = LineLayout::new(state.term_width, name_width);

        // A region drawn before the terminal shrank can be taller than the screen.
        let moved_up = if state.rendered_once {
            state.last_rendered_lines.min(state.term_height)
        } else {
            0
        };
        let line_width = state.term_width.saturating_sub(1);
        out.move_up(moved_up)?;

        for task in &newly_terminal {
            out.clear_line()?;
            out.write_line(&format_status_line(task, now, &layout, &self.palette, true))?;
        }

        let mut region_lines = 0;
        let mut window_lines = 0;
        for task in active.iter().take(window) {
            out.clear_line()?;
            out.write_line(&format_status_line(task, now, &layout, &self.palette, false))?;
            region_lines += 1;
            window_lines += 1;
        }

        out.clear_line()?;
        out.write_line("")?;
        region_lines += 1;

        out.clear_line()?;
        out.write_line(&clip_to_width(render_legend(&self.palette), line_width))?;
        region_lines += 1;

        let counts = StatusCounts::from_tasks(&tasks);
        if let Some(bar) = render_progress_bar(&counts, state.term_width, &self.palette) {
            out.clear_line()?;
            out.write_line(&clip_to_width(bar, line_width))?;
            region_lines += 1;
        }

        // Blank out rows the previous pass drew that nothing overwrote, then
        // return to the end of the region so the next pass moves up over
        // real content only.
        let stale = moved_up.saturating_sub(newly_terminal.len() + region_lines);
        for _ in 0..stale {
            out.clear_line()?;
            out.write_line("")?;
        }
        out.move_up(stale)?;

        out.flush()?;

        state.rendered_once = true;
        state.last_rendered_lines = region_lines;

        Ok(PassStats {
            moved_up,
            committed_lines: newly_terminal.len(),
            region_lines,
            window_lines,
        })
    }

    /// Update cached dimensions and, in windowed mode, redraw immediately.
    pub fn resize(&self, width: usize, height: usize) -> io::Result<PassStats> {
        {
            let mut inner = self.lock();
            inner.state.term_width = width;
            inner.state.term_height = height;
        }
        debug!(width, height, "terminal resized");
        self.render()
    }

    fn write_header(&self, out: &mut dyn TerminalOutput, term_width: usize) -> io::Result<()> {
        out.write_line("")?;
        out.write_line(&self.palette.bold().apply_to("Repository Status").to_string())?;
        out.write_line(
            &self
                .palette
                .dim()
                .apply_to("─".repeat(term_width.saturating_sub(1).min(80)))
                .to_string(),
        )
    }

    /// Print a single line for a meaningful status change (append-only mode).
    fn log_status_change(&self, change: &StatusChange) -> io::Result<()> {
        let task = &change.task;
        if task.status == RepoStatus::Pending || task.status == change.previous {
            return Ok(());
        }
        if self.config.final_status_only() && task.status.is_in_progress() {
            return Ok(());
        }

        let name_width = self.store.max_name_len();
        let mut guard = self.lock();
        let RendererInner { state, out } = &mut *guard;
        let layout = LineLayout::new(state.term_width, name_width);
        out.write_line(&format_status_line(
            task,
            Instant::now(),
            &layout,
            &self.palette,
            false,
        ))?;
        out.flush()
    }
}

impl StatusListener for StatusRenderer {
    fn on_status_change(&self, change: &StatusChange) {
        if self.mode != RenderMode::AppendOnly {
            return;
        }
        if let Err(err) = self.log_status_change(change) {
            warn!("failed to write status line: {}", err);
        }
    }
}

/// Background task redrawing a windowed renderer on a fixed interval.
pub struct RenderLoop {
    renderer: Arc<StatusRenderer>,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RenderLoop {
    /// Start ticking. Returns `None` for append-only renderers.
    pub fn start(renderer: Arc<StatusRenderer>, interval: Duration) -> Option<Self> {
        if renderer.mode() != RenderMode::Windowed {
            return None;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let ticking = Arc::clone(&renderer);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut resizes = ResizeWatcher::new();

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = ticking.render() {
                            warn!("status redraw failed: {}", err);
                            break;
                        }
                    }
                    _ = resizes.changed() => {
                        let (width, height) = terminal_size();
                        if let Err(err) = ticking.resize(width, height) {
                            warn!("status redraw after resize failed: {}", err);
                            break;
                        }
                    }
                }
            }
        });

        Some(Self {
            renderer,
            stop_tx,
            handle,
        })
    }

    /// Stop ticking and draw one last pass so every final status is shown.
    pub async fn finish(self) -> io::Result<()> {
        let _ = self.stop_tx.send(true);
        if let Err(err) = self.handle.await {
            warn!("render loop ended abnormally: {}", err);
        }
        self.renderer.render().map(|_| ())
    }
}

/// Resolves whenever the terminal window changes size.
struct ResizeWatcher {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
}

impl ResizeWatcher {
    #[cfg(unix)]
    fn new() -> Self {
        use tokio::signal::unix::{signal, SignalKind};
        Self {
            signal: signal(SignalKind::window_change()).ok(),
        }
    }

    #[cfg(not(unix))]
    fn new() -> Self {
        Self {}
    }

    #[cfg(unix)]
    async fn changed(&mut self) {
        match self.signal.as_mut() {
            Some(signal) => {
                if signal.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    }

    #[cfg(not(unix))]
    async fn changed(&mut self) {
        std::future::pending::<()>().await
    }
}
