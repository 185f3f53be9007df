//! Reading the status document from disk.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::status::SprintStatus;

/// Raw bytes of the status document, used for progress comparison.
pub fn read_snapshot(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("read status file {}", path.display()))
}

/// Read and parse the status document. Format errors keep their type.
pub fn load_status(path: &Path) -> Result<SprintStatus> {
    let bytes = read_snapshot(path)?;
    Ok(SprintStatus::parse(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusFormatError;

    #[test]
    fn load_reports_format_errors_by_type() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("sprint-status.yaml");
        fs::write(&path, "project: demo\n").expect("write");
        let err = load_status(&path).unwrap_err();
        assert!(err.downcast_ref::<StatusFormatError>().is_some());

        fs::write(&path, "development_status:\n  epic-1: in-progress\n").expect("write");
        let status = load_status(&path).expect("load");
        assert_eq!(status.get("epic-1"), Some("in-progress"));
    }

    #[test]
    fn missing_file_names_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = read_snapshot(&temp.path().join("absent.yaml")).unwrap_err();
        assert!(err.to_string().contains("absent.yaml"));
    }
}
