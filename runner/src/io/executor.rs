//! Executor abstraction for agent invocation.
//!
//! The [`Executor`] trait decouples phase orchestration from the agent
//! process. Tests use scripted executors that rewrite the status file instead
//! of spawning anything.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::error::ProcessExitError;
use crate::io::agent::AgentKind;
use crate::io::display::Style;
use crate::io::process::{StreamOptions, run_streaming};

/// One agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// Phase name, used in output and errors (e.g. `dev-story`).
    pub label: String,
    /// Full prompt text handed to the agent.
    pub prompt: String,
    pub model: String,
}

/// Abstraction over agent execution backends.
pub trait Executor {
    /// Run the agent to completion. An unsuccessful exit is an error.
    fn exec(&self, request: &ExecRequest) -> Result<()>;
}

/// Executor that spawns a real agent binary.
#[derive(Debug, Clone)]
pub struct AgentExecutor {
    pub agent: AgentKind,
    pub program: PathBuf,
    pub workdir: PathBuf,
    pub live: bool,
    pub style: Style,
    pub last_lines: usize,
}

impl Executor for AgentExecutor {
    #[instrument(skip_all, fields(agent = %self.agent, label = %request.label, model = %request.model))]
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        info!(workdir = %self.workdir.display(), "starting agent");
        let invocation =
            self.agent
                .invocation(&self.program, &request.model, &self.workdir, &request.prompt);
        let options = StreamOptions {
            title: format!("{} ({})", request.label, request.model),
            live: self.live,
            style: self.style,
            last_lines: self.last_lines,
        };
        let outcome = run_streaming(&invocation, self.agent.protocol(), &options)?;

        if !outcome.success {
            warn!(exit_code = ?outcome.code, "agent failed");
            if self.live && !outcome.last_lines.is_empty() {
                eprintln!("{}", self.style.warn("last output:"));
                for line in &outcome.last_lines {
                    eprintln!("  {}", self.style.dim(line));
                }
            }
            return Err(ProcessExitError {
                label: request.label.clone(),
                code: outcome.code,
            }
            .into());
        }

        debug!("agent completed successfully");
        Ok(())
    }
}
