//! JSON run reports.
//!
//! A report is the machine-readable counterpart of the log transcript: it is
//! what a mailer or uploader would pick up after a run.

use crate::file_organizer::{OrganizeError, OrganizeReport, OrganizeResult};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    generated_at: String,
    total: usize,
    moved: usize,
    skipped: usize,
    failed: usize,
    roots: &'a [OrganizeReport],
}

impl<'a> RunReport<'a> {
    fn new(roots: &'a [OrganizeReport]) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            total: roots.iter().map(|r| r.total).sum(),
            moved: roots.iter().map(|r| r.moved_count()).sum(),
            skipped: roots.iter().map(|r| r.skipped_count()).sum(),
            failed: roots.iter().map(|r| r.failed_count()).sum(),
            roots,
        }
    }
}

/// Renders the reports of one run (one root, or every root of a batch).
pub fn render_json(reports: &[OrganizeReport]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&RunReport::new(reports))
}

/// Writes the JSON report for a run to `path`.
pub fn write_json(path: &Path, reports: &[OrganizeReport]) -> OrganizeResult<()> {
    let json = render_json(reports).map_err(|e| OrganizeError::WriteFailed {
        path: path.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("JSON serialization failed: {}", e),
        ),
    })?;

    fs::write(path, json).map_err(|e| OrganizeError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_organizer::FileOrganizer;
    use crate::output::NullSink;
    use serde_json::Value;
    use tempfile::TempDir;

    #[test]
    fn test_report_counts_and_outcomes() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "a").expect("Failed to write file");
        fs::write(root.join("b.csv"), "b").expect("Failed to write file");

        let mut organizer = FileOrganizer::default();
        let run = organizer
            .organize(root, false, &mut NullSink)
            .expect("Organize failed");

        let report_path = temp_dir.path().join("report.json");
        write_json(&report_path, &[run]).expect("Report failed");

        let json: Value =
            serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(json["total"], 2);
        assert_eq!(json["moved"], 2);
        assert_eq!(json["failed"], 0);
        assert_eq!(json["roots"][0]["outcomes"][0]["status"], "moved");
        assert_eq!(json["roots"][0]["outcomes"][0]["file_name"], "a.txt");
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("no/such/dir/report.json");

        let result = write_json(&path, &[]);
        assert!(matches!(result, Err(OrganizeError::WriteFailed { .. })));
    }
}
