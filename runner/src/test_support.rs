//! Test-only helpers: temp projects, scripted executors and fixed templates.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::phase::Phase;
use crate::error::ProcessExitError;
use crate::io::executor::{ExecRequest, Executor};
use crate::io::paths::ProjectPaths;
use crate::io::templates::TemplateSource;

/// A throwaway project laid out in the default structure.
pub struct TestProject {
    dir: TempDir,
    paths: ProjectPaths,
}

impl TestProject {
    /// Create the project with output directories and a command template for
    /// every templated phase.
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp project")?;
        let paths = ProjectPaths::for_root(dir.path());
        fs::create_dir_all(paths.planning_dir()).context("create planning dir")?;
        fs::create_dir_all(paths.implementation_dir()).context("create implementation dir")?;
        fs::create_dir_all(paths.commands_dir()).context("create commands dir")?;
        for phase in Phase::ALL.into_iter().filter(|p| p.has_template()) {
            let path = paths
                .commands_dir()
                .join(format!("bmad-bmm-{}.md", phase.as_str()));
            fs::write(&path, format!("# {phase} workflow"))
                .with_context(|| format!("write {}", path.display()))?;
        }
        Ok(Self { dir, paths })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn write_status(&self, yaml: &str) -> Result<()> {
        fs::write(&self.paths.status_file, yaml)
            .with_context(|| format!("write {}", self.paths.status_file.display()))
    }

    pub fn read_status(&self) -> Result<String> {
        fs::read_to_string(&self.paths.status_file)
            .with_context(|| format!("read {}", self.paths.status_file.display()))
    }

    pub fn write_prime_directive(&self, content: &str) -> Result<()> {
        fs::write(&self.paths.prime_directive, content)
            .with_context(|| format!("write {}", self.paths.prime_directive.display()))
    }
}

/// One scripted agent run.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExec {
    /// New status file content written during the run.
    pub status_update: Option<String>,
    /// Exit unsuccessfully after applying the update.
    pub fail: bool,
}

impl ScriptedExec {
    /// A run that changes nothing.
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn writes(status: &str) -> Self {
        Self {
            status_update: Some(status.to_string()),
            fail: false,
        }
    }

    pub fn fails() -> Self {
        Self {
            status_update: None,
            fail: true,
        }
    }
}

/// Executor that replays [`ScriptedExec`]s in order and records requests.
pub struct ScriptedExecutor {
    status_file: Option<PathBuf>,
    queue: RefCell<VecDeque<ScriptedExec>>,
    calls: RefCell<Vec<ExecRequest>>,
}

impl ScriptedExecutor {
    pub fn new(status_file: &Path, execs: Vec<ScriptedExec>) -> Self {
        Self {
            status_file: Some(status_file.to_path_buf()),
            queue: RefCell::new(execs.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Executor with no status file; scripted updates are rejected.
    pub fn detached(execs: Vec<ScriptedExec>) -> Self {
        Self {
            status_file: None,
            queue: RefCell::new(execs.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ExecRequest> {
        self.calls.borrow().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.label.clone()).collect()
    }

    pub fn remaining(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl Executor for ScriptedExecutor {
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        self.calls.borrow_mut().push(request.clone());
        let next = self
            .queue
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted executor exhausted at {}", request.label))?;

        if let Some(update) = &next.status_update {
            let path = self
                .status_file
                .as_ref()
                .ok_or_else(|| anyhow!("detached executor cannot update status"))?;
            fs::write(path, update).with_context(|| format!("write {}", path.display()))?;
        }
        if next.fail {
            return Err(ProcessExitError {
                label: request.label.clone(),
                code: Some(1),
            }
            .into());
        }
        Ok(())
    }
}

/// Templates whose body is `# <phase> workflow`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticTemplates;

impl TemplateSource for StaticTemplates {
    fn load(&self, phase: Phase) -> Result<String> {
        Ok(format!("# {phase} workflow"))
    }
}
