//! Epic planning fallback used when the status file has no work left.
//!
//! One planning cycle has two agent runs: a prompt-only `plan-epic` stage
//! that appends the next epic to the epics document, then `sprint-planning`,
//! which rebuilds the status file from the planning artifacts. Whether the
//! cycle produced work is decided by comparing status-file bytes.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::phase::Phase;
use crate::core::status::SprintStatus;
use crate::io::agent::ModelSelector;
use crate::io::artifacts::{
    ensure_prime_directive, find_epics_file, find_retro_files, is_default_prime_directive,
    read_prime_directive,
};
use crate::io::executor::Executor;
use crate::io::paths::ProjectPaths;
use crate::io::prompt::EpicPlanningContext;
use crate::io::templates::TemplateSource;
use crate::orchestrator::Orchestrator;

/// Result of one planning cycle. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanningOutcome {
    /// The status file changed; new work is ready.
    Staged { epic_number: u32 },
    /// The agents ran but the status file is byte-identical.
    NoNewWork,
    /// No prime directive existed; a default was written for review and no
    /// agent was started.
    PrimeDirectiveCreated { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanningOptions {
    /// Most recent retrospective documents referenced in the prompt.
    pub retro_context_files: usize,
}

impl Default for PlanningOptions {
    fn default() -> Self {
        Self {
            retro_context_files: 2,
        }
    }
}

/// Run one planning cycle.
#[instrument(skip_all, fields(status_file = %paths.status_file.display()))]
pub fn plan_next_epic<E: Executor, T: TemplateSource>(
    orchestrator: &Orchestrator<E, T>,
    paths: &ProjectPaths,
    models: &ModelSelector,
    options: PlanningOptions,
    on_phase: &mut dyn FnMut(Phase, &str),
) -> Result<PlanningOutcome> {
    if ensure_prime_directive(&paths.prime_directive)? {
        return Ok(PlanningOutcome::PrimeDirectiveCreated {
            path: paths.prime_directive.clone(),
        });
    }
    let prime_directive = read_prime_directive(&paths.prime_directive)?;
    if is_default_prime_directive(&prime_directive) {
        warn!(
            path = %paths.prime_directive.display(),
            "prime directive still has template placeholders; planning without project guidance"
        );
    }

    let before = snapshot_or_empty(paths)?;
    let status = SprintStatus::parse(&before).ok();
    let next_epic = status.as_ref().map_or(1, SprintStatus::next_epic_number);
    let completed_epics = status
        .as_ref()
        .map(|s| s.completed_epics().into_iter().map(str::to_string).collect())
        .unwrap_or_default();

    let context = EpicPlanningContext {
        prime_directive,
        next_epic,
        epics_file: find_epics_file(&paths.planning_dir()),
        retro_files: find_retro_files(&paths.implementation_dir(), options.retro_context_files),
        completed_epics,
        status_file: paths.status_file.clone(),
    };
    let prompt = orchestrator.prompts().render_epic_planning(&context)?;

    info!(next_epic, "planning next epic");
    let model = models.model(Phase::PlanEpic);
    on_phase(Phase::PlanEpic, &model);
    orchestrator
        .run_with_prompt(Phase::PlanEpic.as_str(), prompt, &model)
        .with_context(|| format!("plan epic {next_epic}"))?;

    let model = models.model(Phase::SprintPlanning);
    on_phase(Phase::SprintPlanning, &model);
    orchestrator
        .run(Phase::SprintPlanning, &model)
        .context("rebuild sprint status")?;

    let after = snapshot_or_empty(paths)?;
    if after == before {
        info!(next_epic, "planning left the status file unchanged");
        return Ok(PlanningOutcome::NoNewWork);
    }
    Ok(PlanningOutcome::Staged {
        epic_number: next_epic,
    })
}

/// The status file may not exist yet on a project's first planning cycle.
fn snapshot_or_empty(paths: &ProjectPaths) -> Result<Vec<u8>> {
    if !paths.status_file.exists() {
        return Ok(Vec::new());
    }
    crate::io::status_file::read_snapshot(&paths.status_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::agent::AgentKind;
    use crate::test_support::{ScriptedExec, ScriptedExecutor, StaticTemplates, TestProject};

    const DONE_EPIC_1: &str =
        "development_status:\n  epic-1: done\n  1-1-login: done\n  epic-1-retrospective: done\n";

    fn run(project: &TestProject, execs: Vec<ScriptedExec>) -> (PlanningOutcome, Vec<String>) {
        let executor = ScriptedExecutor::new(&project.paths().status_file, execs);
        let orchestrator = Orchestrator::new(executor, StaticTemplates).expect("orchestrator");
        let outcome = plan_next_epic(
            &orchestrator,
            project.paths(),
            &ModelSelector::for_agent(AgentKind::CursorAgent),
            PlanningOptions::default(),
            &mut |_, _| {},
        )
        .expect("plan");
        (outcome, orchestrator.executor().labels())
    }

    /// Verifies a missing prime directive is created and no agent runs.
    #[test]
    fn first_run_creates_prime_directive() {
        let project = TestProject::new().expect("project");
        project.write_status(DONE_EPIC_1).expect("status");
        let (outcome, labels) = run(&project, Vec::new());
        assert_eq!(
            outcome,
            PlanningOutcome::PrimeDirectiveCreated {
                path: project.paths().prime_directive.clone()
            }
        );
        assert!(labels.is_empty());
        assert!(project.paths().prime_directive.exists());
    }

    /// Verifies a status change after both stages stages the next epic.
    #[test]
    fn changed_status_stages_next_epic() {
        let project = TestProject::new().expect("project");
        project.write_status(DONE_EPIC_1).expect("status");
        project
            .write_prime_directive("# Prime Directive\n\nFocus on search.\n")
            .expect("directive");
        let (outcome, labels) = run(
            &project,
            vec![
                ScriptedExec::noop(),
                ScriptedExec::writes(&format!("{DONE_EPIC_1}  epic-2: backlog\n  2-1-search: backlog\n")),
            ],
        );
        assert_eq!(outcome, PlanningOutcome::Staged { epic_number: 2 });
        assert_eq!(labels, vec!["plan-epic", "sprint-planning"]);
    }

    /// Verifies the planning prompt carries completed epics and the directive.
    #[test]
    fn planning_prompt_uses_project_state() {
        let project = TestProject::new().expect("project");
        project.write_status(DONE_EPIC_1).expect("status");
        project
            .write_prime_directive("# Prime Directive\n\nFocus on search.\n")
            .expect("directive");
        let executor = ScriptedExecutor::new(
            &project.paths().status_file,
            vec![ScriptedExec::noop(), ScriptedExec::noop()],
        );
        let orchestrator = Orchestrator::new(executor, StaticTemplates).expect("orchestrator");
        plan_next_epic(
            &orchestrator,
            project.paths(),
            &ModelSelector::for_agent(AgentKind::CursorAgent),
            PlanningOptions::default(),
            &mut |_, _| {},
        )
        .expect("plan");
        let calls = orchestrator.executor().calls();
        assert!(calls[0].prompt.contains("**Epic 2**"));
        assert!(calls[0].prompt.contains("epic-1 are done"));
        assert!(calls[0].prompt.contains("Focus on search."));
        assert_eq!(calls[0].model, calls[1].model);
    }

    /// Verifies an unchanged status file reports no new work.
    #[test]
    fn unchanged_status_is_no_new_work() {
        let project = TestProject::new().expect("project");
        project.write_status(DONE_EPIC_1).expect("status");
        project
            .write_prime_directive("# Prime Directive\n\nShip it.\n")
            .expect("directive");
        let (outcome, _) = run(&project, vec![ScriptedExec::noop(), ScriptedExec::noop()]);
        assert_eq!(outcome, PlanningOutcome::NoNewWork);
    }
}
