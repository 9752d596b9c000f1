//! Terminal output primitives.
//!
//! The renderer only ever moves the cursor up, clears the current line and
//! writes whole lines. Nothing here addresses absolute positions or touches
//! scroll regions.

use std::io::{self, Stdout, Write};
use std::sync::{Arc, Mutex, PoisonError};

use crossterm::cursor::MoveUp;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};

/// Sink for the relative cursor primitives the renderer uses.
pub trait TerminalOutput: Send {
    /// Move the cursor up `lines` rows. Zero is a no-op.
    fn move_up(&mut self, lines: usize) -> io::Result<()>;
    /// Erase the line the cursor is on.
    fn clear_line(&mut self) -> io::Result<()>;
    /// Write `line` followed by a newline.
    fn write_line(&mut self, line: &str) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Emits ANSI sequences to any writer.
#[derive(Debug)]
pub struct AnsiTerminal<W: Write> {
    writer: W,
}

impl AnsiTerminal<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> AnsiTerminal<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> TerminalOutput for AnsiTerminal<W> {
    fn move_up(&mut self, lines: usize) -> io::Result<()> {
        // `ESC[0A` moves one row on most terminals.
        if lines == 0 {
            return Ok(());
        }
        let rows = u16::try_from(lines).unwrap_or(u16::MAX);
        queue!(self.writer, MoveUp(rows))
    }

    fn clear_line(&mut self) -> io::Result<()> {
        queue!(self.writer, Clear(ClearType::CurrentLine))
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// A recorded terminal primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOp {
    MoveUp(usize),
    ClearLine,
    Line(String),
}

/// In-memory terminal that records every primitive it receives.
///
/// Clones share the same log, so a caller can keep one handle while the
/// renderer owns another.
#[derive(Debug, Clone, Default)]
pub struct CaptureTerminal {
    ops: Arc<Mutex<Vec<TerminalOp>>>,
}

impl CaptureTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<TerminalOp> {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Lines written so far, in order.
    pub fn lines(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                TerminalOp::Line(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    /// Whether any cursor movement or line clearing was emitted.
    pub fn has_cursor_control(&self) -> bool {
        self.ops()
            .iter()
            .any(|op| matches!(op, TerminalOp::MoveUp(_) | TerminalOp::ClearLine))
    }

    pub fn clear(&self) {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn push(&self, op: TerminalOp) {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(op);
    }
}

impl TerminalOutput for CaptureTerminal {
    fn move_up(&mut self, lines: usize) -> io::Result<()> {
        if lines > 0 {
            self.push(TerminalOp::MoveUp(lines));
        }
        Ok(())
    }

    fn clear_line(&mut self) -> io::Result<()> {
        self.push(TerminalOp::ClearLine);
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.push(TerminalOp::Line(line.to_string()));
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
