//! Terminal output: colors, the live phase preview, and interactive pauses.

use std::io::{self, BufRead, IsTerminal, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use colored::Colorize;
use crossterm::{cursor, queue, terminal};

use crate::core::stream::sanitize_status_line;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Color switch passed explicitly to everything that prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub color: bool,
}

impl Style {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    pub fn ok(self, text: &str) -> String {
        self.paint(text, |s| s.green().bold().to_string())
    }

    pub fn err(self, text: &str) -> String {
        self.paint(text, |s| s.red().bold().to_string())
    }

    pub fn warn(self, text: &str) -> String {
        self.paint(text, |s| s.yellow().to_string())
    }

    pub fn accent(self, text: &str) -> String {
        self.paint(text, |s| s.cyan().bold().to_string())
    }

    pub fn dim(self, text: &str) -> String {
        self.paint(text, |s| s.dimmed().to_string())
    }

    fn paint(self, text: &str, f: impl Fn(&str) -> String) -> String {
        if self.color { f(text) } else { text.to_string() }
    }
}

/// Icon for a status token in the `status` listing.
pub fn status_icon(value: &str) -> &'static str {
    match value {
        "done" | "completed" => "✔",
        "deferred" => "⤼",
        "optional" => "○",
        "backlog" | "drafted" | "" => "·",
        "review" => "◐",
        _ => "▸",
    }
}

/// Rolling preview of a running phase: a spinner header and the last lines.
pub struct LiveDisplay<W: Write> {
    out: W,
    title: String,
    style: Style,
    started: Instant,
    frame: usize,
    drawn: u16,
}

impl<W: Write> LiveDisplay<W> {
    pub fn new(out: W, title: impl Into<String>, style: Style) -> Self {
        Self {
            out,
            title: title.into(),
            style,
            started: Instant::now(),
            frame: 0,
            drawn: 0,
        }
    }

    /// Redraw the header and `lines` in place of the previous frame.
    pub fn tick(&mut self, lines: &[String]) -> io::Result<()> {
        self.clear()?;
        let spinner = SPINNER[self.frame % SPINNER.len()];
        self.frame += 1;
        writeln!(
            self.out,
            "{} {} {}",
            self.style.accent(spinner),
            self.title,
            self.style.dim(&format_elapsed(self.started.elapsed()))
        )?;
        for line in lines {
            writeln!(self.out, "  {}", self.style.dim(&sanitize_status_line(line)))?;
        }
        self.drawn = u16::try_from(lines.len() + 1).unwrap_or(u16::MAX);
        self.out.flush()
    }

    /// Replace the preview with a final result line.
    pub fn finish(mut self, success: bool) -> io::Result<()> {
        self.clear()?;
        let elapsed = format_elapsed(self.started.elapsed());
        let line = result_line(self.style, &self.title, success, &elapsed);
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }

    fn clear(&mut self) -> io::Result<()> {
        if self.drawn > 0 {
            queue!(self.out, cursor::MoveUp(self.drawn))?;
        }
        queue!(
            self.out,
            cursor::MoveToColumn(0),
            terminal::Clear(terminal::ClearType::FromCursorDown)
        )?;
        self.drawn = 0;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Start line printed before raw agent output in headless mode.
pub fn headless_start(style: Style, title: &str) -> String {
    format!("{} {}", style.accent("▶"), title)
}

/// Result line for a finished phase, shared by both modes.
pub fn result_line(style: Style, title: &str, success: bool, elapsed: &str) -> String {
    if success {
        format!("{} {} {}", style.ok("✔"), title, style.dim(elapsed))
    } else {
        format!("{} {} {}", style.err("✘"), title, style.dim(elapsed))
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}.{}s", secs, elapsed.subsec_millis() / 100)
    }
}

/// Block until the user presses Enter; returns immediately when stdin is not
/// a terminal.
pub fn wait_for_enter(message: &str) -> Result<()> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return Ok(());
    }
    print!("{message}");
    io::stdout().flush().context("flush stdout")?;
    let mut line = String::new();
    stdin.lock().read_line(&mut line).context("read stdin")?;
    Ok(())
}
