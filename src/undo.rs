/// Undo of the most recent organize run.
///
/// Replays the move journal newest-first, moving each file from its bucket
/// folder back to where it was before the run.
use crate::file_organizer::{
    MoveJournal, Operation, OrganizeError, OrganizeResult, display_name, occupied, relocate,
};
use crate::output::{LogLevel, LogSink};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

/// What happened to one journaled file during undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RestoreOutcome {
    Restored {
        file_name: String,
        /// The original location the file is back at.
        path: PathBuf,
    },
    Failed {
        file_name: String,
        /// Where the run had put the file.
        path: PathBuf,
        reason: String,
    },
}

/// Represents the result of an undo operation.
#[derive(Debug, Default, Serialize)]
pub struct UndoReport {
    /// True when the journal was empty and nothing was attempted.
    pub nothing_to_undo: bool,
    /// One outcome per journal entry, newest move first.
    pub outcomes: Vec<RestoreOutcome>,
}

impl UndoReport {
    fn nothing_to_undo() -> Self {
        Self {
            nothing_to_undo: true,
            outcomes: Vec::new(),
        }
    }

    /// Number of files moved back to their original location.
    pub fn restored_files(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RestoreOutcome::Restored { .. }))
            .count()
    }

    /// Files that could not be restored, with the reason.
    pub fn failed_restores(&self) -> Vec<(PathBuf, String)> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                RestoreOutcome::Failed { path, reason, .. } => Some((path.clone(), reason.clone())),
                RestoreOutcome::Restored { .. } => None,
            })
            .collect()
    }

    /// Returns the total number of journal entries processed.
    pub fn total_processed(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if every journaled file was restored.
    pub fn is_complete_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o, RestoreOutcome::Restored { .. }))
    }
}

/// Replays a move journal in reverse.
pub struct UndoManager;

impl UndoManager {
    /// Undoes every move in `journal`, newest first.
    ///
    /// Each restore is attempted independently and reported to `log`; a
    /// failure never stops the remaining restores.
    ///
    /// Afterwards the journal is cleared. With `retain_failed` set, entries
    /// whose restore failed are put back so a later undo can retry them.
    ///
    /// # Edge Cases Handled
    ///
    /// * **Empty journal**: reported as nothing to undo; the filesystem is not touched
    /// * **File missing from its bucket**: recorded as a failure
    /// * **Original location occupied**: recorded as a failure, nothing is overwritten
    /// * **Original directory removed since the run**: recreated before the move
    pub fn undo(journal: &mut MoveJournal, retain_failed: bool, log: &mut dyn LogSink) -> UndoReport {
        if journal.is_empty() {
            log.log(LogLevel::Warning, "Nothing to undo!");
            return UndoReport::nothing_to_undo();
        }

        let operations = journal.take();
        let mut report = UndoReport::default();
        let mut failed = Vec::new();

        for operation in operations.iter().rev() {
            let file_name = display_name(&operation.new_path);
            match Self::restore_file(operation) {
                Ok(()) => {
                    log.log(LogLevel::Success, &format!("Restored: {}", file_name));
                    report.outcomes.push(RestoreOutcome::Restored {
                        file_name,
                        path: operation.original_path.clone(),
                    });
                }
                Err(e) => {
                    log.log(
                        LogLevel::Error,
                        &format!("Failed to restore {}: {}", file_name, e),
                    );
                    report.outcomes.push(RestoreOutcome::Failed {
                        file_name,
                        path: operation.new_path.clone(),
                        reason: e.to_string(),
                    });
                    failed.push(operation.clone());
                }
            }
        }

        if retain_failed && !failed.is_empty() {
            // Back to chronological order for the next attempt.
            failed.reverse();
            log.log(
                LogLevel::Warning,
                &format!("{} failed restore(s) kept for retry", failed.len()),
            );
            journal.replace(failed);
        }

        log.log(LogLevel::Info, "Undo complete!");
        report
    }

    /// Moves a single file back to its original location.
    fn restore_file(operation: &Operation) -> OrganizeResult<()> {
        let failure = |reason: String| OrganizeError::RestoreFailed {
            path: operation.new_path.clone(),
            destination: operation.original_path.clone(),
            reason,
        };

        if !occupied(&operation.new_path) {
            return Err(failure("file not found at organized location".to_string()));
        }

        if occupied(&operation.original_path) {
            return Err(failure("original location is occupied".to_string()));
        }

        if let Some(parent) = operation.original_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                failure(format!("could not recreate {}: {}", parent.display(), e))
            })?;
        }

        relocate(&operation.new_path, &operation.original_path)
            .map_err(|e| failure(e.to_string()))
    }
}
