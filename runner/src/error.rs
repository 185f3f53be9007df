//! Typed failures that callers need to tell apart.
//!
//! Orchestration code propagates `anyhow::Error`; these types ride inside it
//! and are recovered with `downcast_ref` when choosing an exit code.

use thiserror::Error;

/// The status document could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed sprint status: {reason}")]
pub struct StatusFormatError {
    pub reason: String,
}

impl StatusFormatError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The agent binary could not be launched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("agent start failed for {label} ({program}): {reason}")]
pub struct ProcessStartError {
    pub label: String,
    pub program: String,
    pub reason: String,
}

/// The agent ran but did not exit successfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("agent execution failed for {label}: {}", describe_exit(.code))]
pub struct ProcessExitError {
    pub label: String,
    pub code: Option<i32>,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// The status document did not change after repeated runs of the same unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "stall detected: status file unchanged after {count} runs for {key}; update it manually (mark the work done) and run again"
)]
pub struct StallError {
    pub key: String,
    pub count: u32,
}
