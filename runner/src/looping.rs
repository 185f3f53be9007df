//! The autonomous loop behind `sprint-runner auto`.
//!
//! Each pass re-reads the status file, asks the scheduler for the next unit,
//! runs it, and compares status-file bytes to catch agents that did not
//! record progress. With epic planning enabled, an empty schedule triggers a
//! planning cycle instead of ending the loop.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::phase::Phase;
use crate::core::scheduler::{NextWork, next_work};
use crate::core::stall::{StallDetector, StallVerdict};
use crate::core::status::SprintStatus;
use crate::error::StallError;
use crate::io::agent::ModelSelector;
use crate::io::executor::Executor;
use crate::io::paths::ProjectPaths;
use crate::io::status_file::read_snapshot;
use crate::io::templates::TemplateSource;
use crate::orchestrator::Orchestrator;
use crate::pipeline::{run_phase, run_story_pipeline};
use crate::planning::{PlanningOptions, PlanningOutcome, plan_next_epic};

/// Settings for one `auto` session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoConfig {
    /// Agent runs allowed this session (units of work and planning cycles).
    pub max_iterations: u32,
    pub ignore_stall: bool,
    pub epic_planning: bool,
    /// Planning cycles allowed this session.
    pub max_new_epics: u32,
    pub planning: PlanningOptions,
}

impl Default for AutoConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            ignore_stall: false,
            epic_planning: false,
            max_new_epics: 5,
            planning: PlanningOptions::default(),
        }
    }
}

/// Reason why `run_auto` stopped. Every variant is a normal end of session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The schedule is empty and no planning happened (or it is disabled).
    AllDone,
    /// The per-session planning cap was reached; a human should review.
    SessionComplete,
    /// Planning ran after earlier epics were staged but produced nothing new.
    NoNewWork,
    /// A default prime directive was written and awaits review.
    PrimeDirectiveCreated { path: PathBuf },
    /// The iteration limit was reached with work still pending.
    MaxIterationsExceeded { max_iterations: u32 },
}

/// Summary of an `auto` session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Agent-running passes: units of work plus planning cycles.
    pub iterations: u32,
    pub planned_epics: u32,
    pub stop: LoopStop,
}

/// Progress notifications for the caller's UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    WorkSelected {
        iteration: u32,
        work: NextWork,
        done: usize,
        total: usize,
    },
    PhaseStarted {
        phase: Phase,
        model: String,
    },
    StoryFinished {
        story_key: String,
    },
    RetrospectiveFinished {
        epic_key: String,
    },
    /// The status file did not change but the loop continues.
    Stalled {
        key: String,
        count: u32,
    },
    PlanningStarted {
        epic_number: u32,
    },
    EpicStaged {
        epic_number: u32,
    },
}

/// Run units of work until the schedule is exhausted or a limit is hit.
///
/// A stall of the same unit twice in a row (unless ignored) ends the loop
/// with a [`StallError`]. A failing agent run ends it with that run's error.
#[instrument(skip_all, fields(status_file = %paths.status_file.display(), max_iterations = config.max_iterations))]
pub fn run_auto<E: Executor, T: TemplateSource, F: FnMut(LoopEvent)>(
    orchestrator: &Orchestrator<E, T>,
    paths: &ProjectPaths,
    models: &ModelSelector,
    config: &AutoConfig,
    mut on_event: F,
) -> Result<LoopOutcome> {
    let mut stall = StallDetector::new(config.ignore_stall);
    let mut iterations = 0u32;
    let mut planned_epics = 0u32;

    let finish = |iterations: u32, planned_epics: u32, stop: LoopStop| -> Result<LoopOutcome> {
        info!(iterations, planned_epics, ?stop, "auto loop stopped");
        Ok(LoopOutcome {
            iterations,
            planned_epics,
            stop,
        })
    };

    loop {
        let before = read_snapshot(&paths.status_file)?;
        let status = SprintStatus::parse(&before)?;
        let work = next_work(&status);

        if !work.is_found() {
            if !config.epic_planning {
                return finish(iterations, planned_epics, LoopStop::AllDone);
            }
            if planned_epics >= config.max_new_epics {
                return finish(iterations, planned_epics, LoopStop::SessionComplete);
            }
        }
        if iterations >= config.max_iterations {
            return finish(
                iterations,
                planned_epics,
                LoopStop::MaxIterationsExceeded {
                    max_iterations: config.max_iterations,
                },
            );
        }
        iterations += 1;

        let (unit_key, finished) = match &work {
            NextWork::Done => {
                let epic_number = status.next_epic_number();
                on_event(LoopEvent::PlanningStarted { epic_number });
                let outcome = plan_next_epic(
                    orchestrator,
                    paths,
                    models,
                    config.planning,
                    &mut |phase, model| {
                        on_event(LoopEvent::PhaseStarted {
                            phase,
                            model: model.to_string(),
                        })
                    },
                )?;
                match outcome {
                    PlanningOutcome::PrimeDirectiveCreated { path } => {
                        return finish(
                            iterations,
                            planned_epics,
                            LoopStop::PrimeDirectiveCreated { path },
                        );
                    }
                    PlanningOutcome::NoNewWork if planned_epics > 0 => {
                        return finish(iterations, planned_epics, LoopStop::NoNewWork);
                    }
                    PlanningOutcome::NoNewWork => {
                        return finish(iterations, planned_epics, LoopStop::AllDone);
                    }
                    PlanningOutcome::Staged { epic_number } => {
                        planned_epics += 1;
                        stall.reset();
                        on_event(LoopEvent::EpicStaged { epic_number });
                        continue;
                    }
                }
            }
            NextWork::Story {
                epic_key,
                story_key,
            } => {
                let (done, total) = status.epic_progress(epic_key);
                on_event(LoopEvent::WorkSelected {
                    iteration: iterations,
                    work: work.clone(),
                    done,
                    total,
                });
                run_story_pipeline(orchestrator, models, &mut |phase, model| {
                    on_event(LoopEvent::PhaseStarted {
                        phase,
                        model: model.to_string(),
                    })
                })?;
                (
                    story_key.clone(),
                    LoopEvent::StoryFinished {
                        story_key: story_key.clone(),
                    },
                )
            }
            NextWork::Retrospective { epic_key } => {
                let (done, total) = status.epic_progress(epic_key);
                on_event(LoopEvent::WorkSelected {
                    iteration: iterations,
                    work: work.clone(),
                    done,
                    total,
                });
                run_phase(orchestrator, models, Phase::Retrospective, &mut |phase, model| {
                    on_event(LoopEvent::PhaseStarted {
                        phase,
                        model: model.to_string(),
                    })
                })?;
                (
                    format!("{epic_key}-retrospective"),
                    LoopEvent::RetrospectiveFinished {
                        epic_key: epic_key.clone(),
                    },
                )
            }
        };

        let after = read_snapshot(&paths.status_file)?;
        match stall.observe(&unit_key, &before, &after) {
            StallVerdict::Progressed => debug!(unit = %unit_key, "status file changed"),
            StallVerdict::Stalled { key, count } => {
                warn!(unit = %key, count, "status file unchanged after run");
                on_event(LoopEvent::Stalled { key, count });
            }
            StallVerdict::Fatal { key, count } => {
                warn!(unit = %key, count, "stall limit reached");
                return Err(StallError { key, count }.into());
            }
        }
        on_event(finished);
    }
}
