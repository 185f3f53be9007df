//! Loop-level harness tests for `auto` sessions.
//!
//! These drive `run_auto` with scripted executors that rewrite the status file
//! the way a real agent would, and check scheduling order, stall handling, and
//! the epic-planning fallback.

use sprint_runner::core::scheduler::NextWork;
use sprint_runner::error::{ProcessExitError, StallError};
use sprint_runner::io::agent::{AgentKind, ModelSelector};
use sprint_runner::looping::{AutoConfig, LoopEvent, LoopOutcome, LoopStop, run_auto};
use sprint_runner::orchestrator::Orchestrator;
use sprint_runner::test_support::{ScriptedExec, ScriptedExecutor, StaticTemplates, TestProject};

const ONE_STORY: &str = "\
development_status:
  epic-1: in-progress
  1-1-login: backlog
";

const EPIC_1_DONE: &str = "\
development_status:
  epic-1: done
  1-1-login: done
  epic-1-retrospective: done
";

const DIRECTIVE: &str = "# Prime Directive\n\nFocus on account recovery.\n";

struct Session {
    outcome: anyhow::Result<LoopOutcome>,
    events: Vec<LoopEvent>,
    labels: Vec<String>,
    remaining: usize,
}

fn run(project: &TestProject, execs: Vec<ScriptedExec>, config: AutoConfig) -> Session {
    let executor = ScriptedExecutor::new(&project.paths().status_file, execs);
    let orchestrator = Orchestrator::new(executor, StaticTemplates).expect("orchestrator");
    let mut events = Vec::new();
    let outcome = run_auto(
        &orchestrator,
        project.paths(),
        &ModelSelector::for_agent(AgentKind::ClaudeCode),
        &config,
        |event| events.push(event),
    );
    Session {
        outcome,
        events,
        labels: orchestrator.executor().labels(),
        remaining: orchestrator.executor().remaining(),
    }
}

/// Three noop runs followed by one that writes `status`.
fn pipeline_writing(status: &str) -> Vec<ScriptedExec> {
    vec![
        ScriptedExec::noop(),
        ScriptedExec::noop(),
        ScriptedExec::writes(status),
    ]
}

fn stalls(events: &[LoopEvent]) -> Vec<(String, u32)> {
    events
        .iter()
        .filter_map(|event| match event {
            LoopEvent::Stalled { key, count } => Some((key.clone(), *count)),
            _ => None,
        })
        .collect()
}

/// Full epic: two stories, then the retrospective, then all done.
#[test]
fn epic_runs_stories_then_retrospective() {
    let project = TestProject::new().expect("project");
    project
        .write_status(
            "development_status:\n  epic-1: in-progress\n  1-1-login: backlog\n  1-2-logout: backlog\n  epic-1-retrospective: optional\n",
        )
        .expect("status");

    let mut execs = pipeline_writing(
        "development_status:\n  epic-1: in-progress\n  1-1-login: done\n  1-2-logout: backlog\n  epic-1-retrospective: optional\n",
    );
    execs.extend(pipeline_writing(
        "development_status:\n  epic-1: in-progress\n  1-1-login: done\n  1-2-logout: done\n  epic-1-retrospective: optional\n",
    ));
    execs.push(ScriptedExec::writes(
        "development_status:\n  epic-1: done\n  1-1-login: done\n  1-2-logout: done\n  epic-1-retrospective: done\n",
    ));

    let session = run(&project, execs, AutoConfig::default());
    let outcome = session.outcome.expect("auto");
    assert_eq!(outcome.stop, LoopStop::AllDone);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(session.remaining, 0);
    assert_eq!(
        session.labels,
        vec![
            "create-story",
            "dev-story",
            "code-review",
            "create-story",
            "dev-story",
            "code-review",
            "retrospective"
        ]
    );

    let selected: Vec<(NextWork, usize, usize)> = session
        .events
        .iter()
        .filter_map(|event| match event {
            LoopEvent::WorkSelected {
                work, done, total, ..
            } => Some((work.clone(), *done, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(
        selected,
        vec![
            (
                NextWork::Story {
                    epic_key: "epic-1".to_string(),
                    story_key: "1-1-login".to_string()
                },
                0,
                2
            ),
            (
                NextWork::Story {
                    epic_key: "epic-1".to_string(),
                    story_key: "1-2-logout".to_string()
                },
                1,
                2
            ),
            (
                NextWork::Retrospective {
                    epic_key: "epic-1".to_string()
                },
                2,
                2
            ),
        ]
    );
    assert!(session.events.contains(&LoopEvent::RetrospectiveFinished {
        epic_key: "epic-1".to_string()
    }));
    assert!(stalls(&session.events).is_empty());
}

/// The same story leaving the status file untouched twice ends the loop.
#[test]
fn repeated_stall_is_fatal() {
    let project = TestProject::new().expect("project");
    project.write_status(ONE_STORY).expect("status");

    let session = run(
        &project,
        vec![ScriptedExec::noop(); 6],
        AutoConfig::default(),
    );
    let err = session.outcome.expect_err("stall");
    let stall = err.downcast_ref::<StallError>().expect("stall error");
    assert_eq!(stall.key, "1-1-login");
    assert_eq!(stall.count, 2);
    assert_eq!(
        stalls(&session.events),
        vec![("1-1-login".to_string(), 1)]
    );
    assert_eq!(session.remaining, 0);
}

/// With stalls ignored the loop continues and the counter keeps climbing
/// until the iteration limit.
#[test]
fn ignored_stalls_run_until_iteration_limit() {
    let project = TestProject::new().expect("project");
    project.write_status(ONE_STORY).expect("status");

    let session = run(
        &project,
        vec![ScriptedExec::noop(); 9],
        AutoConfig {
            ignore_stall: true,
            max_iterations: 3,
            ..AutoConfig::default()
        },
    );
    let outcome = session.outcome.expect("auto");
    assert_eq!(
        outcome.stop,
        LoopStop::MaxIterationsExceeded { max_iterations: 3 }
    );
    assert_eq!(
        stalls(&session.events),
        vec![
            ("1-1-login".to_string(), 1),
            ("1-1-login".to_string(), 2),
            ("1-1-login".to_string(), 3),
        ]
    );
}

/// Progress between stalls resets the counter.
#[test]
fn progress_resets_stall_counter() {
    let project = TestProject::new().expect("project");
    project
        .write_status("development_status:\n  epic-1: in-progress\n  1-1-login: backlog\n  1-2-logout: backlog\n")
        .expect("status");

    // Stall once, record progress on the same story, stall once more, finish.
    let mut execs = vec![ScriptedExec::noop(); 3];
    execs.extend(pipeline_writing(
        "development_status:\n  epic-1: in-progress\n  1-1-login: review\n  1-2-logout: backlog\n",
    ));
    execs.extend(vec![ScriptedExec::noop(); 3]);
    execs.extend(pipeline_writing(
        "development_status:\n  epic-1: done\n  1-1-login: done\n  1-2-logout: done\n",
    ));

    let session = run(&project, execs, AutoConfig::default());
    let outcome = session.outcome.expect("auto");
    assert_eq!(outcome.stop, LoopStop::AllDone);
    assert_eq!(
        stalls(&session.events),
        vec![("1-1-login".to_string(), 1), ("1-1-login".to_string(), 1)]
    );
}

/// A failing phase ends the loop with the agent's error.
#[test]
fn failing_phase_stops_loop() {
    let project = TestProject::new().expect("project");
    project.write_status(ONE_STORY).expect("status");

    let session = run(
        &project,
        vec![ScriptedExec::noop(), ScriptedExec::fails()],
        AutoConfig::default(),
    );
    let err = session.outcome.expect_err("phase failure");
    let exit = err.downcast_ref::<ProcessExitError>().expect("exit error");
    assert_eq!(exit.label, "dev-story");
    assert_eq!(session.labels, vec!["create-story", "dev-story"]);
}

/// First planning cycle that changes nothing is an ordinary "all done".
#[test]
fn unproductive_first_planning_is_all_done() {
    let project = TestProject::new().expect("project");
    project.write_status(EPIC_1_DONE).expect("status");
    project.write_prime_directive(DIRECTIVE).expect("directive");

    let session = run(
        &project,
        vec![ScriptedExec::noop(), ScriptedExec::noop()],
        AutoConfig {
            epic_planning: true,
            ..AutoConfig::default()
        },
    );
    let outcome = session.outcome.expect("auto");
    assert_eq!(outcome.stop, LoopStop::AllDone);
    assert_eq!(outcome.planned_epics, 0);
    assert_eq!(session.labels, vec!["plan-epic", "sprint-planning"]);
}

/// Planning bootstraps the prime directive before running any agent.
#[test]
fn planning_without_directive_creates_it() {
    let project = TestProject::new().expect("project");
    project.write_status(EPIC_1_DONE).expect("status");

    let session = run(
        &project,
        Vec::new(),
        AutoConfig {
            epic_planning: true,
            ..AutoConfig::default()
        },
    );
    let outcome = session.outcome.expect("auto");
    assert_eq!(
        outcome.stop,
        LoopStop::PrimeDirectiveCreated {
            path: project.paths().prime_directive.clone()
        }
    );
    assert!(session.labels.is_empty());
    assert!(project.paths().prime_directive.exists());
}

/// A staged epic is worked, then the planning cap ends the session.
#[test]
fn planning_cap_completes_session() {
    let project = TestProject::new().expect("project");
    project.write_status(EPIC_1_DONE).expect("status");
    project.write_prime_directive(DIRECTIVE).expect("directive");

    let staged = format!("{EPIC_1_DONE}  epic-2: backlog\n  2-1-reset-password: backlog\n");
    let finished = format!("{EPIC_1_DONE}  epic-2: done\n  2-1-reset-password: done\n");
    let mut execs = vec![ScriptedExec::noop(), ScriptedExec::writes(&staged)];
    execs.extend(pipeline_writing(&finished));

    let session = run(
        &project,
        execs,
        AutoConfig {
            epic_planning: true,
            max_new_epics: 1,
            ..AutoConfig::default()
        },
    );
    let outcome = session.outcome.expect("auto");
    assert_eq!(outcome.stop, LoopStop::SessionComplete);
    assert_eq!(outcome.planned_epics, 1);
    assert_eq!(outcome.iterations, 2);
    assert!(session.events.contains(&LoopEvent::PlanningStarted { epic_number: 2 }));
    assert!(session.events.contains(&LoopEvent::EpicStaged { epic_number: 2 }));
    assert!(session.events.contains(&LoopEvent::StoryFinished {
        story_key: "2-1-reset-password".to_string()
    }));
    assert_eq!(project.read_status().expect("read"), finished);
}

/// Planning that finds nothing after an earlier success reports no new work.
#[test]
fn planning_dry_after_staging_is_no_new_work() {
    let project = TestProject::new().expect("project");
    project.write_status(EPIC_1_DONE).expect("status");
    project.write_prime_directive(DIRECTIVE).expect("directive");

    let staged = format!("{EPIC_1_DONE}  epic-2: backlog\n  2-1-reset-password: backlog\n");
    let finished = format!("{EPIC_1_DONE}  epic-2: done\n  2-1-reset-password: done\n");
    let mut execs = vec![ScriptedExec::noop(), ScriptedExec::writes(&staged)];
    execs.extend(pipeline_writing(&finished));
    execs.extend(vec![ScriptedExec::noop(), ScriptedExec::noop()]);

    let session = run(
        &project,
        execs,
        AutoConfig {
            epic_planning: true,
            ..AutoConfig::default()
        },
    );
    let outcome = session.outcome.expect("auto");
    assert_eq!(outcome.stop, LoopStop::NoNewWork);
    assert_eq!(outcome.planned_epics, 1);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(session.remaining, 0);
}
