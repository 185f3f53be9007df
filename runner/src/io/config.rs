//! Runner configuration stored in `<project-root>/.sprint-runner.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::last_lines::DEFAULT_LAST_LINES;
use crate::core::phase::Phase;
use crate::io::agent::AgentKind;

/// File name looked up in the project root when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = ".sprint-runner.toml";

/// Runner configuration (TOML).
///
/// Every field is optional in the file; command-line flags take precedence
/// over anything set here.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Agent backend.
    pub agent: AgentKind,

    /// Explicit agent binary; looked up on `PATH` when unset.
    pub agent_path: Option<PathBuf>,

    /// Safety limit on loop iterations for `auto`.
    pub max_iterations: u32,

    /// Epics that may be planned in one `auto` session.
    pub max_new_epics: u32,

    /// Keep looping when the status file does not change.
    pub ignore_stall: bool,

    /// Wait for Enter after a retrospective or a newly staged epic.
    pub pause_after_review: bool,

    /// Show the live preview of agent output while a phase runs.
    pub live_status: bool,

    /// Preview lines kept while a phase runs.
    pub last_lines: usize,

    /// Most recent retrospective documents handed to epic planning.
    pub retro_context_files: usize,

    /// Per-phase model overrides keyed by phase name (e.g. `dev-story`).
    pub models: BTreeMap<String, String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            agent: AgentKind::default(),
            agent_path: None,
            max_iterations: 50,
            max_new_epics: 5,
            ignore_stall: false,
            pause_after_review: true,
            live_status: true,
            last_lines: DEFAULT_LAST_LINES,
            retro_context_files: 2,
            models: BTreeMap::new(),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.max_new_epics == 0 {
            return Err(anyhow!("max_new_epics must be > 0"));
        }
        if self.last_lines == 0 {
            return Err(anyhow!("last_lines must be > 0"));
        }
        for phase in self.models.keys() {
            phase
                .parse::<Phase>()
                .with_context(|| format!("invalid [models] entry '{phase}'"))?;
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunnerConfig::default()`.
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    if !path.exists() {
        let cfg = RunnerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunnerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
