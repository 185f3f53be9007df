//! Workflow phases the agent can be asked to run.

use std::fmt;
use std::str::FromStr;

use anyhow::{Error, anyhow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    CreateStory,
    DevStory,
    CodeReview,
    Retrospective,
    SprintPlanning,
    /// Prompt-only planning stage; it has no command template.
    PlanEpic,
}

/// Phases run, in order, for one story.
pub const STORY_PIPELINE: [Phase; 3] = [Phase::CreateStory, Phase::DevStory, Phase::CodeReview];

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::CreateStory,
        Phase::DevStory,
        Phase::CodeReview,
        Phase::Retrospective,
        Phase::SprintPlanning,
        Phase::PlanEpic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::CreateStory => "create-story",
            Phase::DevStory => "dev-story",
            Phase::CodeReview => "code-review",
            Phase::Retrospective => "retrospective",
            Phase::SprintPlanning => "sprint-planning",
            Phase::PlanEpic => "plan-epic",
        }
    }

    /// Human title, e.g. `create story`.
    pub fn title(self) -> String {
        self.as_str().replace('-', " ")
    }

    pub fn has_template(self) -> bool {
        self != Phase::PlanEpic
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| anyhow!("unknown phase '{s}'"))
    }
}
