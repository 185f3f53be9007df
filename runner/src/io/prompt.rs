//! Prompt rendering for agent invocations.

use std::path::PathBuf;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

const AUTONOMOUS_TEMPLATE: &str = include_str!("prompts/autonomous.md");
const PLAN_EPIC_TEMPLATE: &str = include_str!("prompts/plan_epic.md");

/// Epics document named in the planning prompt when none exists yet.
pub const DEFAULT_EPICS_TARGET: &str = "_bmad-output/planning-artifacts/epics.md";

/// Inputs for the epic-planning prompt.
#[derive(Debug, Clone, Default)]
pub struct EpicPlanningContext {
    /// Guiding document content; omitted from the prompt when blank.
    pub prime_directive: String,
    /// Number of the epic to plan.
    pub next_epic: u32,
    pub epics_file: Option<PathBuf>,
    /// Recent retrospective documents, newest first.
    pub retro_files: Vec<PathBuf>,
    /// Fully resolved epic keys, e.g. `epic-1`.
    pub completed_epics: Vec<String>,
    pub status_file: PathBuf,
}

#[derive(Serialize)]
struct PlanningView<'a> {
    prime_directive: Option<&'a str>,
    next_epic: u32,
    epics_file: Option<String>,
    epics_target: String,
    retro_files: Vec<String>,
    completed_epics: &'a [String],
    status_file: String,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("autonomous", AUTONOMOUS_TEMPLATE)
            .context("load autonomous template")?;
        env.add_template("plan_epic", PLAN_EPIC_TEMPLATE)
            .context("load plan_epic template")?;
        Ok(Self { env })
    }

    /// Wrap a phase command with the non-interactive execution preamble.
    pub fn render_autonomous(&self, body: &str) -> Result<String> {
        let template = self.env.get_template("autonomous")?;
        let rendered = template
            .render(context! { body => body })
            .context("render autonomous prompt")?;
        Ok(rendered)
    }

    pub fn render_epic_planning(&self, input: &EpicPlanningContext) -> Result<String> {
        let epics_file = input
            .epics_file
            .as_ref()
            .map(|p| p.display().to_string());
        let view = PlanningView {
            prime_directive: Some(input.prime_directive.trim()).filter(|s| !s.is_empty()),
            next_epic: input.next_epic,
            epics_target: epics_file
                .clone()
                .unwrap_or_else(|| DEFAULT_EPICS_TARGET.to_string()),
            epics_file,
            retro_files: input
                .retro_files
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            completed_epics: &input.completed_epics,
            status_file: input.status_file.display().to_string(),
        };
        let template = self.env.get_template("plan_epic")?;
        let rendered = template
            .render(&view)
            .context("render epic planning prompt")?;
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies the preamble comes first and the command body is kept verbatim.
    #[test]
    fn autonomous_prompt_wraps_body() {
        let engine = PromptEngine::new().expect("engine");
        let body = "# Dev Story\n\n<step n=\"1\">Implement</step>";
        let prompt = engine.render_autonomous(body).expect("render");
        assert!(prompt.starts_with(
            "Execute the following BMAD workflow. CRITICAL: Run in #yolo mode from the start.\n"
        ));
        assert!(prompt.contains("- Simulate expert user responses (y/continue) for any prompts\n\n# Dev Story"));
        assert!(prompt.ends_with(body));
    }

    /// Verifies every planning input reaches the prompt.
    #[test]
    fn planning_prompt_lists_context() {
        let engine = PromptEngine::new().expect("engine");
        let prompt = engine
            .render_epic_planning(&EpicPlanningContext {
                prime_directive: "Ship the sync engine.".to_string(),
                next_epic: 3,
                epics_file: Some(PathBuf::from("/p/epics.md")),
                retro_files: vec![PathBuf::from("/p/epic-2-retro-2026-01-02.md")],
                completed_epics: vec!["epic-1".to_string(), "epic-2".to_string()],
                status_file: PathBuf::from("/p/sprint-status.yaml"),
            })
            .expect("render");
        assert!(prompt.contains("(epic-1, epic-2 are done)"));
        assert!(prompt.contains("**Epic 3**"));
        assert!(prompt.contains("`/p/epics.md`"));
        assert!(prompt.contains("`/p/epic-2-retro-2026-01-02.md`"));
        assert!(prompt.contains("Ship the sync engine."));
        assert!(prompt.contains("Do not edit `/p/sprint-status.yaml`"));
    }

    /// Verifies optional sections disappear when their inputs are empty.
    #[test]
    fn planning_prompt_without_context() {
        let engine = PromptEngine::new().expect("engine");
        let prompt = engine
            .render_epic_planning(&EpicPlanningContext {
                next_epic: 1,
                ..EpicPlanningContext::default()
            })
            .expect("render");
        assert!(prompt.contains("All currently planned work is complete."));
        assert!(!prompt.contains("## Context Files"));
        assert!(!prompt.contains("## Prime Directive"));
        assert!(prompt.contains(DEFAULT_EPICS_TARGET));
    }
}
