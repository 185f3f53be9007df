//! Phase command templates.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use crate::core::phase::Phase;

/// Source of the instruction text for a phase.
pub trait TemplateSource {
    fn load(&self, phase: Phase) -> Result<String>;
}

/// Reads `bmad-bmm-<phase>.md` from a command directory.
#[derive(Debug, Clone)]
pub struct CommandDirTemplates {
    dir: PathBuf,
}

impl CommandDirTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, phase: Phase) -> PathBuf {
        self.dir.join(format!("bmad-bmm-{}.md", phase.as_str()))
    }
}

impl TemplateSource for CommandDirTemplates {
    fn load(&self, phase: Phase) -> Result<String> {
        if !phase.has_template() {
            return Err(anyhow!("phase {phase} has no command template"));
        }
        let path = self.path_for(phase);
        fs::read_to_string(&path).with_context(|| format!("read command template {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_phase_file_from_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("bmad-bmm-dev-story.md"), "implement it").expect("write");
        let templates = CommandDirTemplates::new(temp.path());
        assert_eq!(templates.load(Phase::DevStory).expect("load"), "implement it");
    }

    #[test]
    fn missing_template_names_the_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let templates = CommandDirTemplates::new(temp.path());
        let err = templates.load(Phase::CodeReview).unwrap_err();
        assert!(format!("{err:#}").contains("bmad-bmm-code-review.md"));
        assert!(templates.load(Phase::PlanEpic).is_err());
    }
}
