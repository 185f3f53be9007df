//! Agent backends: binary lookup, invocation arguments, and default models.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::ValueEnum;
use serde::Deserialize;
use tracing::debug;

use crate::core::phase::Phase;
use crate::core::stream::StreamAdapter;
use crate::error::ProcessStartError;
use crate::io::config::RunnerConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    #[default]
    CursorAgent,
    ClaudeCode,
    GeminiCli,
}

/// How an agent reports progress on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputProtocol {
    /// Newline-delimited JSON events.
    EventStream,
    /// Free-form terminal text; best captured through a pseudo-terminal.
    Terminal,
}

impl OutputProtocol {
    pub fn adapter(self) -> StreamAdapter {
        match self {
            OutputProtocol::EventStream => StreamAdapter::AgentEvents,
            OutputProtocol::Terminal => StreamAdapter::Plain,
        }
    }
}

/// Program, arguments and working directory for one agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

impl AgentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::CursorAgent => "cursor-agent",
            AgentKind::ClaudeCode => "claude-code",
            AgentKind::GeminiCli => "gemini-cli",
        }
    }

    /// Binary names tried, in order, when no explicit path is configured.
    pub fn binary_names(self) -> &'static [&'static str] {
        match self {
            AgentKind::CursorAgent => &["cursor-agent", "agent"],
            AgentKind::ClaudeCode => &["claude"],
            AgentKind::GeminiCli => &["gemini"],
        }
    }

    pub fn protocol(self) -> OutputProtocol {
        match self {
            AgentKind::GeminiCli => OutputProtocol::Terminal,
            AgentKind::CursorAgent | AgentKind::ClaudeCode => OutputProtocol::EventStream,
        }
    }

    /// Non-interactive invocation with model selection and working directory.
    pub fn invocation(self, program: &Path, model: &str, workdir: &Path, prompt: &str) -> Invocation {
        let args: Vec<String> = match self {
            AgentKind::ClaudeCode => vec![
                "-p".into(),
                "--output-format".into(),
                "stream-json".into(),
                "--verbose".into(),
                "--model".into(),
                model.into(),
                "--dangerously-skip-permissions".into(),
                prompt.into(),
            ],
            AgentKind::GeminiCli => vec![
                "--approval-mode".into(),
                "yolo".into(),
                "--model".into(),
                model.into(),
                "-p".into(),
                prompt.into(),
            ],
            AgentKind::CursorAgent => vec![
                "-p".into(),
                "--output-format".into(),
                "stream-json".into(),
                "-f".into(),
                "--approve-mcps".into(),
                "--model".into(),
                model.into(),
                "--workspace".into(),
                workdir.display().to_string(),
                prompt.into(),
            ],
        };
        Invocation {
            program: program.to_path_buf(),
            args,
            workdir: workdir.to_path_buf(),
        }
    }

    /// Built-in model for `phase` on this backend.
    pub fn default_model(self, phase: Phase) -> &'static str {
        match self {
            AgentKind::CursorAgent => match phase {
                Phase::CreateStory | Phase::SprintPlanning | Phase::PlanEpic => {
                    "claude-4.6-sonnet-medium"
                }
                Phase::CodeReview | Phase::Retrospective => "gemini-3-flash",
                Phase::DevStory => "composer-1.5",
            },
            // Planning and story creation stay on sonnet; opus only through
            // `[models]` or `--model`.
            AgentKind::ClaudeCode => match phase {
                Phase::DevStory => "haiku",
                _ => "sonnet",
            },
            AgentKind::GeminiCli => match phase {
                Phase::DevStory => "gemini-3-flash",
                _ => "gemini-3-pro",
            },
        }
    }

    /// Find the agent binary: explicit path, then `~/.local/bin`, then `PATH`.
    pub fn locate(self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        let local_bin = dirs::home_dir().map(|home| home.join(".local").join("bin"));
        for name in self.binary_names() {
            if let Some(candidate) = local_bin.as_ref().map(|dir| dir.join(name))
                && candidate.is_file()
            {
                debug!(agent = self.as_str(), path = %candidate.display(), "found agent in ~/.local/bin");
                return Ok(candidate);
            }
            if let Ok(found) = which::which(name) {
                debug!(agent = self.as_str(), path = %found.display(), "found agent on PATH");
                return Ok(found);
            }
        }
        Err(ProcessStartError {
            label: self.as_str().to_string(),
            program: self.binary_names().join(" or "),
            reason: "not found in ~/.local/bin or PATH (pass --agent-path)".to_string(),
        }
        .into())
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model choice: `--model` flag, then config override, then the built-in table.
#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    pub agent: AgentKind,
    pub forced: Option<String>,
    pub overrides: std::collections::BTreeMap<String, String>,
}

impl ModelSelector {
    pub fn for_agent(agent: AgentKind) -> Self {
        Self {
            agent,
            ..Self::default()
        }
    }

    /// Selector for the configured agent with its `[models]` table.
    pub fn from_config(config: &RunnerConfig, forced: Option<String>) -> Self {
        Self {
            agent: config.agent,
            forced,
            overrides: config.models.clone(),
        }
    }

    pub fn model(&self, phase: Phase) -> String {
        if let Some(model) = &self.forced {
            return model.clone();
        }
        if let Some(model) = self.overrides.get(phase.as_str()) {
            return model.clone();
        }
        self.agent.default_model(phase).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_invocation_requests_event_stream() {
        let inv = AgentKind::ClaudeCode.invocation(
            Path::new("/usr/bin/claude"),
            "sonnet",
            Path::new("/work"),
            "do it",
        );
        assert_eq!(inv.program, PathBuf::from("/usr/bin/claude"));
        assert_eq!(inv.workdir, PathBuf::from("/work"));
        assert_eq!(
            inv.args,
            vec![
                "-p",
                "--output-format",
                "stream-json",
                "--verbose",
                "--model",
                "sonnet",
                "--dangerously-skip-permissions",
                "do it"
            ]
        );
        assert_eq!(AgentKind::ClaudeCode.protocol(), OutputProtocol::EventStream);
    }

    #[test]
    fn cursor_invocation_passes_workspace() {
        let inv = AgentKind::CursorAgent.invocation(
            Path::new("agent"),
            "composer-1.5",
            Path::new("/work"),
            "prompt",
        );
        let pos = inv
            .args
            .iter()
            .position(|a| a == "--workspace")
            .expect("workspace flag");
        assert_eq!(inv.args[pos + 1], "/work");
        assert_eq!(inv.args.last().map(String::as_str), Some("prompt"));
    }

    #[test]
    fn gemini_uses_terminal_protocol() {
        assert_eq!(AgentKind::GeminiCli.protocol(), OutputProtocol::Terminal);
        assert_eq!(
            AgentKind::GeminiCli.protocol().adapter(),
            StreamAdapter::Plain
        );
    }

    #[test]
    fn explicit_path_wins_lookup() {
        let path = AgentKind::ClaudeCode
            .locate(Some(Path::new("/opt/claude")))
            .expect("locate");
        assert_eq!(path, PathBuf::from("/opt/claude"));
    }

    #[test]
    fn model_selection_precedence() {
        let mut selector = ModelSelector::for_agent(AgentKind::ClaudeCode);
        assert_eq!(selector.model(Phase::DevStory), "haiku");
        assert_eq!(
            selector.model(Phase::PlanEpic),
            selector.model(Phase::SprintPlanning)
        );

        selector
            .overrides
            .insert("dev-story".to_string(), "sonnet".to_string());
        assert_eq!(selector.model(Phase::DevStory), "sonnet");

        selector.forced = Some("opus".to_string());
        assert_eq!(selector.model(Phase::DevStory), "opus");
    }

    #[test]
    fn claude_defaults_keep_planning_on_sonnet() {
        for phase in [Phase::PlanEpic, Phase::CreateStory, Phase::SprintPlanning] {
            assert_eq!(AgentKind::ClaudeCode.default_model(phase), "sonnet");
        }
        assert_eq!(AgentKind::ClaudeCode.default_model(Phase::DevStory), "haiku");
    }

    #[test]
    fn kind_names_match_config_spelling() {
        let parsed: AgentKind = serde_json::from_str("\"gemini-cli\"").expect("parse");
        assert_eq!(parsed, AgentKind::GeminiCli);
        assert_eq!(AgentKind::default().to_string(), "cursor-agent");
    }
}
