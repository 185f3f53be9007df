//! One unit of work: the story pipeline or a retrospective.

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::core::phase::{Phase, STORY_PIPELINE};
use crate::core::scheduler::{NextWork, next_work};
use crate::io::agent::ModelSelector;
use crate::io::executor::Executor;
use crate::io::status_file::load_status;
use crate::io::templates::TemplateSource;
use crate::orchestrator::Orchestrator;

/// Run create-story, dev-story and code-review in order; stops at the first
/// failing phase.
pub fn run_story_pipeline<E: Executor, T: TemplateSource>(
    orchestrator: &Orchestrator<E, T>,
    models: &ModelSelector,
    on_phase: &mut dyn FnMut(Phase, &str),
) -> Result<()> {
    for phase in STORY_PIPELINE {
        run_phase(orchestrator, models, phase, on_phase)?;
    }
    Ok(())
}

pub fn run_phase<E: Executor, T: TemplateSource>(
    orchestrator: &Orchestrator<E, T>,
    models: &ModelSelector,
    phase: Phase,
    on_phase: &mut dyn FnMut(Phase, &str),
) -> Result<()> {
    let model = models.model(phase);
    on_phase(phase, &model);
    orchestrator.run(phase, &model)
}

/// What a bare `run` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextRun {
    /// Ran the story pipeline for the scheduled story.
    Story { epic_key: String, story_key: String },
    /// Ran the retrospective for the epic.
    Retrospective { epic_key: String },
    /// The status file could not be read; ran the story pipeline anyway.
    UnknownStatus,
    /// Nothing left to schedule; no agent was started.
    AllDone,
}

/// Run whatever the status file says comes next.
pub fn run_next<E: Executor, T: TemplateSource>(
    orchestrator: &Orchestrator<E, T>,
    models: &ModelSelector,
    status_file: &Path,
    on_phase: &mut dyn FnMut(Phase, &str),
) -> Result<NextRun> {
    let status = match load_status(status_file) {
        Ok(status) => status,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "cannot read status file, running full story pipeline");
            run_story_pipeline(orchestrator, models, on_phase)?;
            return Ok(NextRun::UnknownStatus);
        }
    };

    match next_work(&status) {
        NextWork::Story {
            epic_key,
            story_key,
        } => {
            info!(epic = %epic_key, story = %story_key, "running story pipeline");
            run_story_pipeline(orchestrator, models, on_phase)?;
            Ok(NextRun::Story {
                epic_key,
                story_key,
            })
        }
        NextWork::Retrospective { epic_key } => {
            info!(epic = %epic_key, "running retrospective");
            run_phase(orchestrator, models, Phase::Retrospective, on_phase)?;
            Ok(NextRun::Retrospective { epic_key })
        }
        NextWork::Done => Ok(NextRun::AllDone),
    }
}
