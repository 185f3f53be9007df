//! Sprint status document model.
//!
//! The `development_status` mapping is kept as an ordered list of entries.
//! Grouping is positional: a story or retrospective belongs to the closest
//! epic key above it, so document order must survive parsing untouched.

use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;

use crate::error::StatusFormatError;

/// Top-level key holding the ordered status entries.
pub const ENTRIES_KEY: &str = "development_status";

/// Status tokens that resolve a story for scheduling.
pub const RESOLVED_STORY_STATUSES: [&str; 2] = ["done", "deferred"];

/// Retrospective statuses treated as finished.
pub const TERMINAL_RETRO_STATUSES: [&str; 2] = ["done", "completed"];

/// Story statuses that do not count as "started".
pub const UNSTARTED_STORY_STATUSES: [&str; 2] = ["backlog", "drafted"];

/// Retrospective value marking it as skippable.
pub const OPTIONAL_RETRO_STATUS: &str = "optional";

static EPIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^epic-(\d+)$").expect("epic pattern"));
static STORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+-\d+-.+").expect("story pattern"));
static RETRO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^epic-\d+-retrospective$").expect("retrospective pattern"));

/// One `development_status` line, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedEntry {
    pub key: String,
    pub value: String,
}

impl OrderedEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn kind(&self) -> KeyKind {
        KeyKind::classify(&self.key)
    }

    /// True when a story with this status needs no further scheduling.
    pub fn is_resolved(&self) -> bool {
        RESOLVED_STORY_STATUSES.contains(&self.value.as_str())
    }

    /// True when a story with this status has moved past planning.
    pub fn is_started(&self) -> bool {
        !UNSTARTED_STORY_STATUSES.contains(&self.value.as_str())
    }
}

/// Shape-based classification of an entry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Epic,
    Story,
    Retrospective,
    Other,
}

impl KeyKind {
    pub fn classify(key: &str) -> Self {
        if EPIC_RE.is_match(key) {
            KeyKind::Epic
        } else if STORY_RE.is_match(key) {
            KeyKind::Story
        } else if RETRO_RE.is_match(key) {
            KeyKind::Retrospective
        } else {
            KeyKind::Other
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            KeyKind::Epic => "Epic",
            KeyKind::Story => "Story",
            KeyKind::Retrospective => "Retro",
            KeyKind::Other => "Other",
        }
    }
}

/// Derived view: one epic with the entries that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpicGroup<'a> {
    pub epic_key: &'a str,
    pub stories: Vec<&'a OrderedEntry>,
    pub retrospective: Option<&'a OrderedEntry>,
}

impl EpicGroup<'_> {
    pub fn all_stories_resolved(&self) -> bool {
        self.stories.iter().all(|story| story.is_resolved())
    }

    pub fn first_pending_story(&self) -> Option<&OrderedEntry> {
        self.stories
            .iter()
            .find(|story| !story.is_resolved())
            .copied()
    }

    pub fn any_story_started(&self) -> bool {
        self.stories.iter().any(|story| story.is_started())
    }

    /// Returns `(done, total)` for the group's stories.
    pub fn progress(&self) -> (usize, usize) {
        let done = self.stories.iter().filter(|s| s.is_resolved()).count();
        (done, self.stories.len())
    }
}

/// Root aggregate of the status document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SprintStatus {
    pub generated: Option<String>,
    pub project: Option<String>,
    pub story_location: Option<String>,
    pub entries: Vec<OrderedEntry>,
}

impl SprintStatus {
    /// Parse raw document bytes, preserving `development_status` order.
    pub fn parse(bytes: &[u8]) -> Result<Self, StatusFormatError> {
        let doc: Value = serde_yaml::from_slice(bytes)
            .map_err(|err| StatusFormatError::new(format!("invalid yaml: {err}")))?;
        let Value::Mapping(root) = doc else {
            return Err(StatusFormatError::new("expected a mapping at the document root"));
        };

        let container = root
            .get(ENTRIES_KEY)
            .ok_or_else(|| StatusFormatError::new(format!("{ENTRIES_KEY} key not found")))?;
        let Value::Mapping(container) = container else {
            return Err(StatusFormatError::new(format!(
                "{ENTRIES_KEY} must be a mapping"
            )));
        };

        // serde_yaml mappings iterate in insertion order.
        let entries = container
            .iter()
            .filter_map(|(key, value)| Some(OrderedEntry::new(scalar(key)?, scalar(value)?)))
            .collect();

        Ok(Self {
            generated: root.get("generated").and_then(scalar),
            project: root.get("project").and_then(scalar),
            story_location: root.get("story_location").and_then(scalar),
            entries,
        })
    }

    /// Look up an entry's status by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    /// Group entries under their epic in a single forward pass.
    ///
    /// Stories and retrospectives that appear before the first epic key have
    /// no group and are dropped. A later retrospective entry in the same group
    /// replaces an earlier one.
    pub fn epic_groups(&self) -> Vec<EpicGroup<'_>> {
        let mut groups: Vec<EpicGroup<'_>> = Vec::new();
        for entry in &self.entries {
            match entry.kind() {
                KeyKind::Epic => groups.push(EpicGroup {
                    epic_key: &entry.key,
                    stories: Vec::new(),
                    retrospective: None,
                }),
                KeyKind::Story => {
                    if let Some(group) = groups.last_mut() {
                        group.stories.push(entry);
                    }
                }
                KeyKind::Retrospective => {
                    if let Some(group) = groups.last_mut() {
                        group.retrospective = Some(entry);
                    }
                }
                KeyKind::Other => {}
            }
        }
        groups
    }

    /// Returns `(done, total)` stories for `epic_key`, or `(0, 0)` if unknown.
    pub fn epic_progress(&self, epic_key: &str) -> (usize, usize) {
        self.epic_groups()
            .iter()
            .find(|group| group.epic_key == epic_key)
            .map(EpicGroup::progress)
            .unwrap_or((0, 0))
    }

    /// Highest epic number plus one, or 1 when the document has no epics.
    pub fn next_epic_number(&self) -> u32 {
        self.epic_groups()
            .iter()
            .filter_map(|group| epic_number(group.epic_key))
            .max()
            .map_or(1, |max| max.saturating_add(1))
    }

    /// Epic keys whose own status is `done`, in document order.
    pub fn completed_epics(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.kind() == KeyKind::Epic && entry.value == "done")
            .map(|entry| entry.key.as_str())
            .collect()
    }
}

/// Numeric suffix of an epic key (`epic-12` → 12); `None` when malformed.
pub fn epic_number(key: &str) -> Option<u32> {
    EPIC_RE
        .captures(key)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Tagged(tagged) => scalar(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}
