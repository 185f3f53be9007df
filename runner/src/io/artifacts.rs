//! Planning artifacts on disk: the prime directive, the epics document and
//! retrospective write-ups.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info};

const DEFAULT_PRIME_DIRECTIVE: &str = include_str!("prompts/prime_directive.md");

const VISION_PLACEHOLDER: &str = "(Fill in your project vision here)";
const GOALS_PLACEHOLDER: &str = "(Describe your next milestone or desired outcome)";

const EPICS_CANDIDATES: [&str; 2] = ["epics.md", "bmm-epics.md"];

static RETRO_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^epic-.+-retro-.+\.md$").expect("retro pattern"));

/// Write the default prime directive if none exists.
///
/// Returns `true` when the file was created; planning should stop so a human
/// can edit it first.
pub fn ensure_prime_directive(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_PRIME_DIRECTIVE)
        .with_context(|| format!("write prime directive {}", path.display()))?;
    info!(path = %path.display(), "created default prime directive");
    Ok(true)
}

/// Prime directive content, or an empty string when the file is missing.
pub fn read_prime_directive(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(err).with_context(|| format!("read prime directive {}", path.display())),
    }
}

/// Whether `content` still carries the unedited template placeholders.
pub fn is_default_prime_directive(content: &str) -> bool {
    content.contains(VISION_PLACEHOLDER) || content.contains(GOALS_PLACEHOLDER)
}

/// Existing epics document in `planning_dir`, if any.
pub fn find_epics_file(planning_dir: &Path) -> Option<PathBuf> {
    if let Some(found) = EPICS_CANDIDATES
        .iter()
        .map(|name| planning_dir.join(name))
        .find(|path| path.is_file())
    {
        return Some(found);
    }
    let mut fuzzy = markdown_files(planning_dir)
        .into_iter()
        .filter(|name| name.contains("epic"))
        .collect::<Vec<_>>();
    fuzzy.sort();
    fuzzy.first().map(|name| planning_dir.join(name))
}

/// Retrospective documents in `implementation_dir`, newest first by name.
///
/// Names carry the date (`epic-2-retro-2026-03-01.md`), so reverse name order
/// is recency order. `max == 0` means no limit.
pub fn find_retro_files(implementation_dir: &Path, max: usize) -> Vec<PathBuf> {
    let mut names: Vec<String> = markdown_files(implementation_dir)
        .into_iter()
        .filter(|name| RETRO_FILE.is_match(name))
        .collect();
    names.sort_by(|a, b| b.cmp(a));
    if max > 0 {
        names.truncate(max);
    }
    debug!(count = names.len(), "found retrospective files");
    names
        .into_iter()
        .map(|name| implementation_dir.join(name))
        .collect()
}

fn markdown_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".md"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_creates_default_once() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("_bmad-output").join("prime-directive.md");

        assert!(ensure_prime_directive(&path).expect("first"));
        let content = read_prime_directive(&path).expect("read");
        assert!(content.starts_with("# Prime Directive"));
        assert!(is_default_prime_directive(&content));

        fs::write(&path, "# Prime Directive\n\nBuild offline sync.\n").expect("edit");
        assert!(!ensure_prime_directive(&path).expect("second"));
        let edited = read_prime_directive(&path).expect("read");
        assert!(!is_default_prime_directive(&edited));
    }

    #[test]
    fn missing_directive_reads_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert_eq!(
            read_prime_directive(&temp.path().join("nope.md")).expect("read"),
            ""
        );
    }

    #[test]
    fn epics_file_prefers_canonical_names() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path();
        assert_eq!(find_epics_file(dir), None);

        fs::write(dir.join("my-epic-list.md"), "x").expect("write");
        assert_eq!(find_epics_file(dir), Some(dir.join("my-epic-list.md")));

        fs::write(dir.join("bmm-epics.md"), "x").expect("write");
        assert_eq!(find_epics_file(dir), Some(dir.join("bmm-epics.md")));

        fs::write(dir.join("epics.md"), "x").expect("write");
        assert_eq!(find_epics_file(dir), Some(dir.join("epics.md")));
    }

    #[test]
    fn retro_files_newest_first_and_capped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path();
        for name in [
            "epic-1-retro-2026-01-10.md",
            "epic-2-retro-2026-02-14.md",
            "epic-3-retro-2026-03-20.md",
            "1-1-login.md",
        ] {
            fs::write(dir.join(name), "x").expect("write");
        }
        let found = find_retro_files(dir, 2);
        assert_eq!(
            found,
            vec![
                dir.join("epic-3-retro-2026-03-20.md"),
                dir.join("epic-2-retro-2026-02-14.md"),
            ]
        );
        assert_eq!(find_retro_files(dir, 0).len(), 3);
        assert!(find_retro_files(&dir.join("missing"), 2).is_empty());
    }
}
