//! Turning agent output into human-readable status lines.
//!
//! Agents either print opaque terminal text or emit newline-delimited JSON
//! events. Each raw line goes through one [`StreamAdapter`], chosen when the
//! process is launched, and yields zero or more preview lines.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display columns available to one preview line.
pub const STATUS_LINE_WIDTH: usize = 60;

const COMMAND_PREVIEW_CHARS: usize = 50;

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[a-zA-Z]").expect("ansi pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamAdapter {
    /// Every line is shown as-is.
    Plain,
    /// Lines are JSON event records; only assistant turns produce output.
    AgentEvents,
}

impl StreamAdapter {
    pub fn status_lines(self, raw: &str) -> Vec<String> {
        match self {
            StreamAdapter::Plain => vec![raw.to_string()],
            StreamAdapter::AgentEvents => event_status_lines(raw),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AgentEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: Option<AgentMessage>,
}

#[derive(Debug, Deserialize)]
struct AgentMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

fn event_status_lines(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    let Ok(event) = serde_json::from_str::<AgentEvent>(raw) else {
        return Vec::new();
    };
    if event.kind != "assistant" {
        return Vec::new();
    }
    let Some(message) = event.message else {
        return Vec::new();
    };
    message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { name, input } => Some(describe_tool_use(name, input)),
            ContentBlock::Text { text } => last_non_empty_line(text).map(str::to_string),
            ContentBlock::Other => None,
        })
        .collect()
}

/// One-line summary of a tool invocation.
pub fn describe_tool_use(name: &str, input: &Value) -> String {
    let field = |key: &str| {
        input
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };
    let described = match name {
        "Read" | "read_file" => field("file_path").map(|p| format!("Reading {p}")),
        "Edit" | "edit_file" => field("file_path").map(|p| format!("Editing {p}")),
        "Write" | "write_file" => field("file_path").map(|p| format!("Writing {p}")),
        "Bash" | "execute_command" => field("command").map(|c| format!("Running: {}", shorten(c))),
        _ => None,
    };
    described.unwrap_or_else(|| format!("Tool: {name}"))
}

fn shorten(command: &str) -> String {
    if command.chars().count() <= COMMAND_PREVIEW_CHARS {
        return command.to_string();
    }
    let kept: String = command.chars().take(COMMAND_PREVIEW_CHARS - 3).collect();
    format!("{kept}...")
}

pub fn last_non_empty_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rev().find(|line| !line.is_empty())
}

/// Make a raw line safe for a one-line terminal preview.
///
/// Strips ANSI escapes and control characters, folds line breaks into spaces
/// and truncates to [`STATUS_LINE_WIDTH`] display columns.
pub fn sanitize_status_line(line: &str) -> String {
    let stripped = ANSI_ESCAPE.replace_all(line, "");
    let cleaned: String = stripped
        .chars()
        .filter_map(|c| match c {
            '\r' | '\n' => Some(' '),
            '\t' => Some(c),
            c if (c as u32) < 32 => None,
            c => Some(c),
        })
        .collect();
    truncate_width(cleaned.trim(), STATUS_LINE_WIDTH)
}

fn truncate_width(line: &str, max: usize) -> String {
    if line.width() <= max {
        return line.to_string();
    }
    let tail = "...";
    let budget = max.saturating_sub(tail.width());
    let mut used = 0;
    let mut out = String::new();
    for c in line.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push_str(tail);
    out
}

/// Splits raw terminal bytes into lines.
///
/// `\n`, `\r\n` and a bare `\r` all end a line, so carriage-return progress
/// redraws become separate lines instead of one ever-growing one.
#[derive(Debug, Default)]
pub struct TerminalLineSplitter {
    pending: Vec<u8>,
    after_cr: bool,
}

impl TerminalLineSplitter {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            match byte {
                b'\n' if self.after_cr => self.after_cr = false,
                b'\n' | b'\r' => {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                    self.after_cr = byte == b'\r';
                }
                _ => {
                    self.after_cr = false;
                    self.pending.push(byte);
                }
            }
        }
        lines
    }

    /// Trailing text without a line terminator.
    pub fn finish(&mut self) -> Option<String> {
        self.after_cr = false;
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}
