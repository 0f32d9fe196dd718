//! dirbucket - bucket files into extension/date/size folders, with undo
//!
//! This library classifies the files under a folder by extension, modification
//! month and optionally size, moves them into matching subfolders, and keeps a
//! journal of the moves so the most recent run can be reverted. Progress and
//! log lines are delivered through injected sinks so the core never prints.

pub mod classify;
pub mod cli;
pub mod config;
pub mod file_organizer;
pub mod output;
pub mod report;
pub mod undo;

pub use classify::{ClassificationKey, SizeCategory};
pub use config::{CompiledFilters, Config, ConfigError};
pub use file_organizer::{
    FileOrganizer, MoveJournal, MoveOutcome, OrganizeError, OrganizeReport, OrganizerState,
};
pub use output::{LogLevel, LogSink, NullSink, ProgressSink, Transcript};
pub use undo::{RestoreOutcome, UndoManager, UndoReport};

pub use cli::{Cli, run_cli};
