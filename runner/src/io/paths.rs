//! Project layout: where the status document, planning artifacts and phase
//! command templates live relative to the project root.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Status document location relative to the project root.
pub const DEFAULT_STATUS_FILE: &str = "_bmad-output/implementation-artifacts/sprint-status.yaml";
/// Guiding document for epic planning, relative to the project root.
pub const DEFAULT_PRIME_DIRECTIVE: &str = "_bmad-output/prime-directive.md";

const OUTPUT_DIR: &str = "_bmad-output";
const PLANNING_DIR: &str = "planning-artifacts";
const IMPLEMENTATION_DIR: &str = "implementation-artifacts";
const COMMANDS_DIR: &str = ".cursor/commands";

/// Resolved paths for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub status_file: PathBuf,
    pub prime_directive: PathBuf,
}

impl ProjectPaths {
    /// Resolve paths from CLI inputs.
    ///
    /// `status_file` defaults to [`DEFAULT_STATUS_FILE`] under the current
    /// directory. The root is `root_override` when given, otherwise derived from
    /// the status file location (see [`resolve_project_root`]).
    pub fn resolve(
        status_file: Option<&Path>,
        root_override: Option<&Path>,
        prime_directive: Option<&Path>,
    ) -> Result<Self> {
        let status_file = match status_file {
            Some(path) => absolute(path)?,
            None => match root_override {
                Some(root) => absolute(&root.join(DEFAULT_STATUS_FILE))?,
                None => absolute(Path::new(DEFAULT_STATUS_FILE))?,
            },
        };
        let root = match root_override {
            Some(root) => absolute(root)?,
            None => resolve_project_root(&status_file),
        };
        let prime_directive = match prime_directive {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => root.join(path),
            None => root.join(DEFAULT_PRIME_DIRECTIVE),
        };
        Ok(Self {
            root,
            status_file,
            prime_directive,
        })
    }

    /// Paths for a project laid out in the default structure under `root`.
    pub fn for_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            status_file: root.join(DEFAULT_STATUS_FILE),
            prime_directive: root.join(DEFAULT_PRIME_DIRECTIVE),
        }
    }

    pub fn planning_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR).join(PLANNING_DIR)
    }

    pub fn implementation_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR).join(IMPLEMENTATION_DIR)
    }

    pub fn commands_dir(&self) -> PathBuf {
        self.root.join(COMMANDS_DIR)
    }
}

/// Project root for an absolute status file path.
///
/// The status file normally sits three levels below the root
/// (`<root>/_bmad-output/implementation-artifacts/sprint-status.yaml`). When
/// walking up would reach the filesystem root, the status file's own
/// directory is used instead.
pub fn resolve_project_root(status_file: &Path) -> PathBuf {
    let parent = status_file.parent().unwrap_or(Path::new("/"));
    match status_file.ancestors().nth(3) {
        Some(root) if root.parent().is_some() => root.to_path_buf(),
        _ => parent.to_path_buf(),
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("resolve path {}", path.display()))
}
