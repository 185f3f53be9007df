//! Turning a phase into an agent run: template, autonomous preamble, executor.

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::phase::Phase;
use crate::io::executor::{ExecRequest, Executor};
use crate::io::prompt::PromptEngine;
use crate::io::templates::TemplateSource;

pub struct Orchestrator<E, T> {
    executor: E,
    templates: T,
    prompts: PromptEngine,
}

impl<E: Executor, T: TemplateSource> Orchestrator<E, T> {
    pub fn new(executor: E, templates: T) -> Result<Self> {
        Ok(Self {
            executor,
            templates,
            prompts: PromptEngine::new()?,
        })
    }

    /// Run `phase` with its command template wrapped in the autonomous preamble.
    #[instrument(skip_all, fields(phase = %phase, model))]
    pub fn run(&self, phase: Phase, model: &str) -> Result<()> {
        let body = self
            .templates
            .load(phase)
            .with_context(|| format!("load template for {phase}"))?;
        let prompt = self.prompts.render_autonomous(&body)?;
        debug!(prompt_bytes = prompt.len(), "rendered phase prompt");
        self.run_with_prompt(phase.as_str(), prompt, model)
    }

    /// Run the agent with a prompt built by the caller.
    pub fn run_with_prompt(&self, label: &str, prompt: String, model: &str) -> Result<()> {
        self.executor.exec(&ExecRequest {
            label: label.to_string(),
            prompt,
            model: model.to_string(),
        })
    }

    pub fn prompts(&self) -> &PromptEngine {
        &self.prompts
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}
