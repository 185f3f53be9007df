//! Deterministic selection of the next unit of work.

use crate::core::status::{EpicGroup, OPTIONAL_RETRO_STATUS, SprintStatus, TERMINAL_RETRO_STATUSES};

/// What the loop should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextWork {
    /// Run the story pipeline for the first pending story of `epic_key`.
    Story { epic_key: String, story_key: String },
    /// Run the retrospective for `epic_key`.
    Retrospective { epic_key: String },
    /// Nothing left to schedule.
    Done,
}

impl NextWork {
    /// Action token: `"story"`, `"retrospective"`, or `""` when done.
    pub fn action(&self) -> &'static str {
        match self {
            NextWork::Story { .. } => "story",
            NextWork::Retrospective { .. } => "retrospective",
            NextWork::Done => "",
        }
    }

    pub fn epic_key(&self) -> Option<&str> {
        match self {
            NextWork::Story { epic_key, .. } | NextWork::Retrospective { epic_key } => {
                Some(epic_key)
            }
            NextWork::Done => None,
        }
    }

    pub fn story_key(&self) -> Option<&str> {
        match self {
            NextWork::Story { story_key, .. } => Some(story_key),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, NextWork::Done)
    }

    /// Key used to track progress on this unit across iterations.
    pub fn unit_key(&self) -> Option<String> {
        match self {
            NextWork::Story { story_key, .. } => Some(story_key.clone()),
            NextWork::Retrospective { epic_key } => Some(format!("{epic_key}-retrospective")),
            NextWork::Done => None,
        }
    }
}

/// Scan epics front to back and return the earliest unfinished unit.
///
/// An epic with an unresolved story always wins over anything later in the
/// document. Once an epic's stories are resolved, a non-terminal
/// retrospective is due immediately, except an `optional` one, which is
/// skipped for good as soon as the following epic has a started story.
pub fn next_work(status: &SprintStatus) -> NextWork {
    let groups = status.epic_groups();
    for (idx, group) in groups.iter().enumerate() {
        if let Some(story) = group.first_pending_story() {
            return NextWork::Story {
                epic_key: group.epic_key.to_string(),
                story_key: story.key.clone(),
            };
        }

        let Some(retro) = group.retrospective else {
            continue;
        };
        if TERMINAL_RETRO_STATUSES.contains(&retro.value.as_str()) {
            continue;
        }
        if retro.value == OPTIONAL_RETRO_STATUS && next_epic_started(groups.get(idx + 1)) {
            continue;
        }
        return NextWork::Retrospective {
            epic_key: group.epic_key.to_string(),
        };
    }
    NextWork::Done
}

fn next_epic_started(next: Option<&EpicGroup<'_>>) -> bool {
    next.is_some_and(EpicGroup::any_story_started)
}
