//! Autonomous BMAD sprint runner.
//!
//! Reads `sprint-status.yaml`, picks the next story or retrospective, and
//! drives a coding agent through the workflow phases for it.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};

use sprint_runner::core::phase::Phase;
use sprint_runner::core::scheduler::{NextWork, next_work};
use sprint_runner::core::status::{KeyKind, SprintStatus};
use sprint_runner::error::{ProcessExitError, ProcessStartError, StallError, StatusFormatError};
use sprint_runner::exit_codes;
use sprint_runner::io::agent::{AgentKind, ModelSelector};
use sprint_runner::io::config::{CONFIG_FILE_NAME, RunnerConfig, load_config};
use sprint_runner::io::display::{Style, status_icon, wait_for_enter};
use sprint_runner::io::executor::AgentExecutor;
use sprint_runner::io::paths::ProjectPaths;
use sprint_runner::io::status_file::load_status;
use sprint_runner::io::templates::CommandDirTemplates;
use sprint_runner::logging;
use sprint_runner::looping::{AutoConfig, LoopEvent, LoopStop, run_auto};
use sprint_runner::orchestrator::Orchestrator;
use sprint_runner::pipeline::{NextRun, run_next, run_phase};
use sprint_runner::planning::{PlanningOptions, PlanningOutcome, plan_next_epic};

#[derive(Parser)]
#[command(
    name = "sprint-runner",
    version,
    about = "Autonomous BMAD sprint loop driving a coding agent"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Sprint status file (default: _bmad-output/implementation-artifacts/sprint-status.yaml).
    #[arg(short = 's', long, global = true)]
    status_file: Option<PathBuf>,

    /// Project root (default: derived from the status file location).
    #[arg(short = 'r', long, global = true)]
    project_root: Option<PathBuf>,

    /// Agent backend.
    #[arg(short = 't', long, value_enum, global = true)]
    agent: Option<AgentKind>,

    /// Explicit agent binary.
    #[arg(short = 'a', long, global = true)]
    agent_path: Option<PathBuf>,

    /// Model for every phase, overriding config and defaults.
    #[arg(short = 'm', long, global = true)]
    model: Option<String>,

    /// Config file (default: <project-root>/.sprint-runner.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Guiding document for epic planning (default: _bmad-output/prime-directive.md).
    #[arg(long, global = true)]
    prime_directive: Option<PathBuf>,

    /// Print raw agent output instead of the live preview.
    #[arg(long, global = true)]
    no_live_status: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show sprint entries and the next unit of work.
    Status,
    /// Run one phase, or the next unit of work when no phase is given.
    Run {
        /// create-story, dev-story, code-review, retrospective, or sprint-planning.
        phase: Option<Phase>,
    },
    /// Plan and stage one new epic.
    PlanEpics,
    /// Loop over stories and retrospectives until the sprint is done.
    Auto(AutoArgs),
}

#[derive(Args)]
struct AutoArgs {
    /// Safety limit on agent runs.
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Keep going when the status file does not change.
    #[arg(long)]
    ignore_stall: bool,

    /// Plan new epics when all work is done.
    #[arg(long)]
    enable_epic_planning: bool,

    /// Epics that may be planned this session.
    #[arg(long)]
    max_new_epics: Option<u32>,

    /// Do not wait for Enter after retrospectives and staged epics.
    #[arg(long)]
    no_pause_after_retro: bool,
}

/// Everything resolved from flags, config file and defaults.
struct Session {
    paths: ProjectPaths,
    config: RunnerConfig,
    agent: AgentKind,
    agent_path: Option<PathBuf>,
    models: ModelSelector,
    style: Style,
    live: bool,
}

type AgentOrchestrator = Orchestrator<AgentExecutor, CommandDirTemplates>;

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.chain().any(|e| e.is::<StallError>()) {
        exit_codes::STALLED
    } else if err
        .chain()
        .any(|e| e.is::<ProcessStartError>() || e.is::<ProcessExitError>())
    {
        exit_codes::PHASE_FAILED
    } else {
        exit_codes::INVALID
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let session = Session::resolve(&cli.global)?;
    match cli.command {
        Command::Status => cmd_status(&session),
        Command::Run { phase } => cmd_run(&session, phase),
        Command::PlanEpics => cmd_plan_epics(&session),
        Command::Auto(args) => cmd_auto(&session, &args),
    }
}

impl Session {
    fn resolve(args: &GlobalArgs) -> Result<Self> {
        let paths = ProjectPaths::resolve(
            args.status_file.as_deref(),
            args.project_root.as_deref(),
            args.prime_directive.as_deref(),
        )?;
        let config_path = args
            .config
            .clone()
            .unwrap_or_else(|| paths.root.join(CONFIG_FILE_NAME));
        let config = load_config(&config_path)?;

        let agent = args.agent.unwrap_or(config.agent);
        let models = ModelSelector {
            agent,
            ..ModelSelector::from_config(&config, args.model.clone())
        };
        let stdout_tty = std::io::stdout().is_terminal();
        let color = !args.no_color && std::env::var_os("NO_COLOR").is_none() && stdout_tty;
        let live = config.live_status && !args.no_live_status && stdout_tty;

        Ok(Self {
            agent_path: args.agent_path.clone().or_else(|| config.agent_path.clone()),
            paths,
            config,
            agent,
            models,
            style: Style::new(color),
            live,
        })
    }

    fn orchestrator(&self) -> Result<AgentOrchestrator> {
        let program = self.agent.locate(self.agent_path.as_deref())?;
        let executor = AgentExecutor {
            agent: self.agent,
            program,
            workdir: self.paths.root.clone(),
            live: self.live,
            style: self.style,
            last_lines: self.config.last_lines,
        };
        Orchestrator::new(executor, CommandDirTemplates::new(self.paths.commands_dir()))
    }

    fn announce_phase(&self, phase: Phase, model: &str) {
        println!(
            "{} {} {}",
            self.style.accent("→"),
            phase.title(),
            self.style.dim(&format!("[{} · {model}]", self.agent))
        );
    }
}

fn cmd_status(session: &Session) -> Result<i32> {
    let status = load_status(&session.paths.status_file)?;
    let style = session.style;

    if let Some(project) = &status.project {
        println!("{} {project}", style.accent("Project:"));
    }
    if let Some(generated) = &status.generated {
        println!("{} {generated}", style.dim("Generated:"));
    }
    if let Some(location) = &status.story_location {
        println!("{} {location}", style.dim("Stories:"));
    }
    println!();
    for entry in &status.entries {
        let kind = entry.kind();
        let indent = if kind == KeyKind::Epic { "" } else { "  " };
        println!(
            "{indent}{} {:<6} {} {}",
            status_icon(&entry.value),
            kind.label(),
            entry.key,
            style.dim(&entry.value)
        );
    }
    println!();
    print_next(style, &status);
    Ok(exit_codes::OK)
}

fn print_next(style: Style, status: &SprintStatus) {
    match next_work(status) {
        NextWork::Story {
            epic_key,
            story_key,
        } => {
            let (done, total) = status.epic_progress(&epic_key);
            println!(
                "{} story {story_key} {}",
                style.accent("Next:"),
                style.dim(&format!("({epic_key}: {done}/{total} done)"))
            );
        }
        NextWork::Retrospective { epic_key } => {
            println!("{} retrospective for {epic_key}", style.accent("Next:"));
        }
        NextWork::Done => println!("{}", style.ok("All work complete.")),
    }
}

fn cmd_run(session: &Session, phase: Option<Phase>) -> Result<i32> {
    let orchestrator = session.orchestrator()?;
    let mut announce = |phase: Phase, model: &str| session.announce_phase(phase, model);

    if let Some(phase) = phase {
        if !phase.has_template() {
            return Err(anyhow!(
                "{phase} runs only as part of plan-epics or auto --enable-epic-planning"
            ));
        }
        run_phase(&orchestrator, &session.models, phase, &mut announce)?;
        return Ok(exit_codes::OK);
    }

    match run_next(
        &orchestrator,
        &session.models,
        &session.paths.status_file,
        &mut announce,
    )? {
        NextRun::Story { story_key, .. } => {
            println!("{}", session.style.ok(&format!("Story {story_key} finished.")));
        }
        NextRun::Retrospective { epic_key } => {
            println!(
                "{}",
                session
                    .style
                    .ok(&format!("Retrospective for {epic_key} finished."))
            );
        }
        NextRun::UnknownStatus => {
            println!("{}", session.style.ok("Story pipeline finished."));
        }
        NextRun::AllDone => println!("{}", session.style.ok("All work complete.")),
    }
    Ok(exit_codes::OK)
}

fn cmd_plan_epics(session: &Session) -> Result<i32> {
    let orchestrator = session.orchestrator()?;
    let outcome = plan_next_epic(
        &orchestrator,
        &session.paths,
        &session.models,
        PlanningOptions {
            retro_context_files: session.config.retro_context_files,
        },
        &mut |phase, model| session.announce_phase(phase, model),
    )?;
    match outcome {
        PlanningOutcome::Staged { epic_number } => println!(
            "{}",
            session
                .style
                .ok(&format!("Epic {epic_number} staged in the sprint status."))
        ),
        PlanningOutcome::NoNewWork => println!(
            "{}",
            session
                .style
                .warn("Planning finished but the sprint status did not change.")
        ),
        PlanningOutcome::PrimeDirectiveCreated { path } => print_directive_created(session, &path),
    }
    Ok(exit_codes::OK)
}

fn cmd_auto(session: &Session, args: &AutoArgs) -> Result<i32> {
    let config = AutoConfig {
        max_iterations: args
            .max_iterations
            .unwrap_or(session.config.max_iterations),
        ignore_stall: args.ignore_stall || session.config.ignore_stall,
        epic_planning: args.enable_epic_planning,
        max_new_epics: args.max_new_epics.unwrap_or(session.config.max_new_epics),
        planning: PlanningOptions {
            retro_context_files: session.config.retro_context_files,
        },
    };
    if config.max_iterations == 0 || config.max_new_epics == 0 {
        return Err(anyhow!("--max-iterations and --max-new-epics must be > 0"));
    }
    let pause = session.config.pause_after_review && !args.no_pause_after_retro;
    let orchestrator = session.orchestrator()?;
    let style = session.style;

    let outcome = run_auto(
        &orchestrator,
        &session.paths,
        &session.models,
        &config,
        |event| match event {
            LoopEvent::WorkSelected {
                iteration,
                work,
                done,
                total,
            } => {
                let what = match &work {
                    NextWork::Story { story_key, .. } => format!("story {story_key}"),
                    NextWork::Retrospective { .. } => "retrospective".to_string(),
                    NextWork::Done => String::new(),
                };
                println!(
                    "\n{} {what} {}",
                    style.accent(&format!("[{iteration}]")),
                    style.dim(&format!(
                        "({}: {done}/{total} stories done)",
                        work.epic_key().unwrap_or_default()
                    ))
                );
            }
            LoopEvent::PhaseStarted { phase, model } => session.announce_phase(phase, &model),
            LoopEvent::StoryFinished { story_key } => {
                println!("{}", style.ok(&format!("Story {story_key} finished.")));
            }
            LoopEvent::RetrospectiveFinished { epic_key } => {
                println!(
                    "{}",
                    style.ok(&format!("Retrospective for {epic_key} finished."))
                );
                if pause {
                    pause_for_review("Review the retrospective, then press Enter to continue...");
                }
            }
            LoopEvent::Stalled { key, count } => {
                println!(
                    "{}",
                    style.warn(&format!(
                        "Status file unchanged after {key} ({count} in a row); continuing."
                    ))
                );
            }
            LoopEvent::PlanningStarted { epic_number } => {
                println!(
                    "\n{} Planning epic {epic_number}...",
                    style.accent("All planned work is done.")
                );
            }
            LoopEvent::EpicStaged { epic_number } => {
                println!("{}", style.ok(&format!("Epic {epic_number} staged.")));
                if pause {
                    pause_for_review("Review the new epic, then press Enter to continue...");
                }
            }
        },
    )?;

    let iterations = outcome.iterations;
    match outcome.stop {
        LoopStop::AllDone => {
            println!("\n{}", style.ok("All work complete."));
        }
        LoopStop::SessionComplete => println!(
            "\n{}",
            style.ok(&format!(
                "Session complete: planned {} new epic(s). Review them before the next run.",
                outcome.planned_epics
            ))
        ),
        LoopStop::NoNewWork => println!(
            "\n{}",
            style.ok(&format!(
                "Session complete: planned {} new epic(s); planning found no further work.",
                outcome.planned_epics
            ))
        ),
        LoopStop::PrimeDirectiveCreated { path } => print_directive_created(session, &path),
        LoopStop::MaxIterationsExceeded { max_iterations } => {
            eprintln!(
                "{}",
                style.err(&format!(
                    "Stopped after {max_iterations} iterations with work remaining."
                ))
            );
            return Ok(exit_codes::MAX_ITERATIONS);
        }
    }
    println!("{}", style.dim(&format!("{iterations} iteration(s)")));
    Ok(exit_codes::OK)
}

fn pause_for_review(message: &str) {
    if let Err(err) = wait_for_enter(message) {
        tracing::warn!(err = %format!("{err:#}"), "could not read from stdin");
    }
}

fn print_directive_created(session: &Session, path: &Path) {
    println!(
        "{}",
        session
            .style
            .warn(&format!("Created a default prime directive at {}.", path.display()))
    );
    println!("Edit it to describe where the project should go next, then run again.");
}
