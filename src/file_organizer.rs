/// Bucketing files into `<extension>/<year>/<month>[/<size>]` folders.
///
/// This module owns the organize run: it snapshots the files under a root,
/// classifies each one, moves it into its bucket folder, and records every
/// completed move in a journal so the run can be undone.
use crate::classify::{ClassificationKey, suffixed_file_name};
use crate::config::{CompiledFilters, Config, ConfigError};
use crate::output::{LogLevel, LogSink, RunObserver};
use crate::undo::{UndoManager, UndoReport};
use log::{debug, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Reason attached to files that already sit in their bucket folder.
pub const ALREADY_ORGANIZED: &str = "already organized";

/// Reason attached to hidden directories the walk does not enter.
pub const HIDDEN_FOLDER: &str = "hidden folder";

/// A single completed move, recorded so it can be reversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    /// Where the file was before the run.
    pub original_path: PathBuf,
    /// Where the run moved it.
    pub new_path: PathBuf,
}

/// Ordered record of the moves made by the most recent run.
///
/// Only moves that completed are ever recorded. The journal lives in memory
/// and is gone when the process exits.
#[derive(Debug, Clone, Default)]
pub struct MoveJournal {
    operations: Vec<Operation>,
}

impl MoveJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn clear(&mut self) {
        self.operations.clear();
    }

    /// Removes and returns every entry, leaving the journal empty.
    pub(crate) fn take(&mut self) -> Vec<Operation> {
        std::mem::take(&mut self.operations)
    }

    pub(crate) fn replace(&mut self, operations: Vec<Operation>) {
        self.operations = operations;
    }
}

/// Whether the organizer currently holds something to undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizerState {
    /// Nothing to undo.
    Idle,
    /// The journal holds moves from the last run.
    Journaled,
}

/// What happened to one file during an organize run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MoveOutcome {
    Moved {
        file_name: String,
        source: PathBuf,
        destination: PathBuf,
    },
    Skipped {
        file_name: String,
        path: PathBuf,
        reason: String,
    },
    Failed {
        file_name: String,
        source: PathBuf,
        reason: String,
    },
}

impl MoveOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            Self::Moved { file_name, .. }
            | Self::Skipped { file_name, .. }
            | Self::Failed { file_name, .. } => file_name,
        }
    }

    pub fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    fn log_to(&self, log: &mut (impl LogSink + ?Sized)) {
        match self {
            Self::Moved {
                file_name,
                destination,
                ..
            } => {
                let folder = destination.parent().unwrap_or(destination);
                log.log(
                    LogLevel::Success,
                    &format!("Moved: {} --> {}", file_name, folder.display()),
                );
            }
            Self::Skipped {
                file_name, reason, ..
            } => {
                log.log(
                    LogLevel::Info,
                    &format!("Skipped: {} ({})", file_name, reason),
                );
            }
            Self::Failed {
                file_name, reason, ..
            } => {
                log.log(
                    LogLevel::Error,
                    &format!("Failed: {} | Error: {}", file_name, reason),
                );
            }
        }
    }
}

/// Result of organizing one root.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizeReport {
    pub root: PathBuf,
    /// Number of files enumerated before any move began.
    pub total: usize,
    /// One outcome per enumerated file, in processing order.
    pub outcomes: Vec<MoveOutcome>,
    /// Entries the walk could not read, with the reason.
    pub unreadable: Vec<(PathBuf, String)>,
}

impl OrganizeReport {
    fn new(root: &Path, total: usize) -> Self {
        Self {
            root: root.to_path_buf(),
            total,
            outcomes: Vec::with_capacity(total),
            unreadable: Vec::new(),
        }
    }

    pub fn moved_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_moved()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.moved_count() - self.failed_count()
    }

    /// Number of moved files per extension folder.
    pub fn bucket_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for outcome in &self.outcomes {
            if let MoveOutcome::Moved { destination, .. } = outcome
                && let Ok(relative) = destination.strip_prefix(&self.root)
                && let Some(bucket) = relative.components().next()
            {
                let bucket = bucket.as_os_str().to_string_lossy().into_owned();
                *counts.entry(bucket).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// A move that a dry run would perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Outcome of a dry run: what would move, and what would be left alone.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub root: PathBuf,
    pub moves: Vec<PlannedMove>,
    pub skipped: Vec<(PathBuf, String)>,
}

/// Errors that can occur during organize and undo.
#[derive(Debug)]
pub enum OrganizeError {
    /// The root is missing or not a directory. Nothing is attempted.
    InvalidRoot { path: PathBuf, reason: String },
    /// Failed to create a bucket directory.
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to move a file into its bucket.
    FileMoveFailure {
        source: PathBuf,
        destination: PathBuf,
        source_error: std::io::Error,
    },
    /// The file's metadata could not be read, so it cannot be classified.
    MetadataUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The modification time could not be read. Recovered by bucketing the
    /// file under `Unknown_Year/Unknown_Month`.
    TimestampUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A journaled file could not be moved back.
    RestoreFailed {
        path: PathBuf,
        destination: PathBuf,
        reason: String,
    },
    /// Failed to list a directory.
    ReadDirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write a log or report file.
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for OrganizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRoot { path, reason } => {
                write!(f, "Invalid folder path {}: {}", path.display(), reason)
            }
            Self::DirectoryCreationFailed { path, source } => {
                write!(
                    f,
                    "Failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::FileMoveFailure {
                source,
                destination,
                source_error,
            } => {
                write!(
                    f,
                    "Failed to move {} to {}: {}",
                    source.display(),
                    destination.display(),
                    source_error
                )
            }
            Self::MetadataUnavailable { path, source } => {
                write!(f, "Cannot read metadata of {}: {}", path.display(), source)
            }
            Self::TimestampUnavailable { path, source } => {
                write!(
                    f,
                    "Modification time of {} unavailable: {}",
                    path.display(),
                    source
                )
            }
            Self::RestoreFailed {
                path,
                destination,
                reason,
            } => {
                write!(
                    f,
                    "Cannot restore {} to {}: {}",
                    path.display(),
                    destination.display(),
                    reason
                )
            }
            Self::ReadDirFailed { path, source } => {
                write!(f, "Failed to read directory {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for OrganizeError {}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Buckets files and remembers the last run so it can be undone.
///
/// Runs take `&mut self`, so one organizer never has two runs in flight.
///
/// # Examples
///
/// ```no_run
/// use dirbucket::file_organizer::FileOrganizer;
/// use dirbucket::output::NullSink;
/// use std::path::Path;
///
/// let mut organizer = FileOrganizer::default();
/// let report = organizer
///     .organize(Path::new("/home/user/Downloads"), false, &mut NullSink)
///     .expect("organize failed");
/// println!("moved {} of {} files", report.moved_count(), report.total);
///
/// let undo = organizer.undo(&mut NullSink);
/// println!("restored {} files", undo.restored_files());
/// ```
#[derive(Debug, Default)]
pub struct FileOrganizer {
    filters: CompiledFilters,
    retain_failed_restores: bool,
    journal: MoveJournal,
    duplicate_counter: HashMap<String, u32>,
}

impl FileOrganizer {
    pub fn new(filters: CompiledFilters) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    /// Builds an organizer from the filter and undo settings of `config`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let organizer = Self::new(config.compile_filters()?)
            .retain_failed_restores(config.undo.retain_failed);
        Ok(organizer)
    }

    /// Keep journal entries whose restore failed instead of clearing them.
    pub fn retain_failed_restores(mut self, retain: bool) -> Self {
        self.retain_failed_restores = retain;
        self
    }

    pub fn state(&self) -> OrganizerState {
        if self.journal.is_empty() {
            OrganizerState::Idle
        } else {
            OrganizerState::Journaled
        }
    }

    pub fn journal(&self) -> &MoveJournal {
        &self.journal
    }

    /// Organizes every file under `root` into bucket folders inside `root`.
    ///
    /// The file list is snapshotted before anything moves, so files landing
    /// in bucket folders are never picked up again. Per-file failures are
    /// reported in the returned outcomes and never stop the run.
    ///
    /// # Errors
    ///
    /// Returns `OrganizeError::InvalidRoot` if `root` is missing or not a
    /// directory; the journal from the previous run is left untouched.
    pub fn organize(
        &mut self,
        root: &Path,
        sort_by_size: bool,
        observer: &mut dyn RunObserver,
    ) -> OrganizeResult<OrganizeReport> {
        validate_root(root)?;
        self.begin_run();

        observer.log(LogLevel::Info, &format!("Organizing: {}", root.display()));
        let report = self.organize_tree(root, sort_by_size, observer);
        observer.log(LogLevel::Info, &completion_banner(&report));

        Ok(report)
    }

    /// Organizes each immediate subfolder of `parent` as its own root.
    ///
    /// The whole batch is one run: undo reverts every subfolder.
    pub fn organize_batch(
        &mut self,
        parent: &Path,
        sort_by_size: bool,
        observer: &mut dyn RunObserver,
    ) -> OrganizeResult<Vec<OrganizeReport>> {
        validate_root(parent)?;
        let (subfolders, hidden) = self.subfolders(parent)?;
        self.begin_run();

        for dir in &hidden {
            observer.log(
                LogLevel::Info,
                &format!("Skipped: {} ({})", display_name(dir), HIDDEN_FOLDER),
            );
        }

        if subfolders.is_empty() {
            observer.log(
                LogLevel::Warning,
                &format!("No subfolders found in {}", parent.display()),
            );
            return Ok(Vec::new());
        }

        let mut reports = Vec::with_capacity(subfolders.len());
        for folder in subfolders {
            observer.log(LogLevel::Info, &format!("Organizing: {}", folder.display()));
            let report = self.organize_tree(&folder, sort_by_size, observer);
            observer.log(LogLevel::Info, &completion_banner(&report));
            reports.push(report);
        }

        Ok(reports)
    }

    /// Computes where every file would go without touching the filesystem
    /// or the journal.
    pub fn plan(&self, root: &Path, sort_by_size: bool) -> OrganizeResult<Plan> {
        validate_root(root)?;

        let mut counters = HashMap::new();
        let mut planned: HashSet<PathBuf> = HashSet::new();
        let mut plan = Plan {
            root: root.to_path_buf(),
            moves: Vec::new(),
            skipped: Vec::new(),
        };

        let snapshot = self.snapshot(root);
        plan.skipped.extend(snapshot.unreadable);
        plan.skipped.extend(
            snapshot
                .hidden_dirs
                .into_iter()
                .map(|dir| (dir, HIDDEN_FOLDER.to_string())),
        );

        for source in snapshot.files {
            let target_dir = match classify_file(&source, sort_by_size) {
                Ok(classified) => classified.key.destination_dir(root),
                Err(e) => {
                    plan.skipped.push((source, e.to_string()));
                    continue;
                }
            };
            if source.parent() == Some(target_dir.as_path()) {
                plan.skipped.push((source, ALREADY_ORGANIZED.to_string()));
                continue;
            }
            let Some(file_name) = source.file_name() else {
                continue;
            };

            let destination = resolve_collision(&target_dir, file_name, &mut counters, |p| {
                planned.contains(p) || occupied(p)
            });
            planned.insert(destination.clone());
            plan.moves.push(PlannedMove {
                source,
                destination,
            });
        }

        Ok(plan)
    }

    /// Moves every file of the last run back where it came from, newest first.
    ///
    /// An empty journal is a no-op, not an error.
    pub fn undo(&mut self, log: &mut dyn LogSink) -> UndoReport {
        UndoManager::undo(&mut self.journal, self.retain_failed_restores, log)
    }

    fn begin_run(&mut self) {
        self.journal.clear();
        self.duplicate_counter.clear();
    }

    fn organize_tree(
        &mut self,
        root: &Path,
        sort_by_size: bool,
        observer: &mut dyn RunObserver,
    ) -> OrganizeReport {
        let snapshot = self.snapshot(root);
        for dir in &snapshot.hidden_dirs {
            observer.log(
                LogLevel::Info,
                &format!("Skipped: {} ({})", display_name(dir), HIDDEN_FOLDER),
            );
        }
        for (_, reason) in &snapshot.unreadable {
            observer.log(
                LogLevel::Warning,
                &format!("Skipped unreadable entry: {}", reason),
            );
        }

        let total = snapshot.files.len();
        let mut report = OrganizeReport::new(root, total);
        report.unreadable = snapshot.unreadable;

        observer.start(total);
        for (index, source) in snapshot.files.iter().enumerate() {
            let outcome = self.organize_file(root, source, sort_by_size, &mut *observer);
            outcome.log_to(&mut *observer);
            report.outcomes.push(outcome);
            observer.advance(index + 1, total);
        }
        observer.finish();

        report
    }

    fn organize_file(
        &mut self,
        root: &Path,
        source: &Path,
        sort_by_size: bool,
        log: &mut (impl LogSink + ?Sized),
    ) -> MoveOutcome {
        let file_name = display_name(source);

        let key = match classify_file(source, sort_by_size) {
            Ok(Classified { key, undated }) => {
                if let Some(e) = undated {
                    log.log(
                        LogLevel::Warning,
                        &format!(
                            "{}; filed under {}/{}",
                            e, key.date.year, key.date.month
                        ),
                    );
                }
                key
            }
            Err(e) => {
                return MoveOutcome::Failed {
                    file_name,
                    source: source.to_path_buf(),
                    reason: e.to_string(),
                };
            }
        };

        let target_dir = key.destination_dir(root);
        if source.parent() == Some(target_dir.as_path()) {
            return MoveOutcome::Skipped {
                file_name,
                path: source.to_path_buf(),
                reason: ALREADY_ORGANIZED.to_string(),
            };
        }

        match self.move_into(source, &target_dir) {
            Ok(destination) => {
                self.journal.record(Operation {
                    original_path: source.to_path_buf(),
                    new_path: destination.clone(),
                });
                MoveOutcome::Moved {
                    file_name,
                    source: source.to_path_buf(),
                    destination,
                }
            }
            Err(e) => MoveOutcome::Failed {
                file_name,
                source: source.to_path_buf(),
                reason: e.to_string(),
            },
        }
    }

    fn move_into(&mut self, source: &Path, target_dir: &Path) -> OrganizeResult<PathBuf> {
        fs::create_dir_all(target_dir).map_err(|e| OrganizeError::DirectoryCreationFailed {
            path: target_dir.to_path_buf(),
            source: e,
        })?;

        let file_name = source
            .file_name()
            .ok_or_else(|| OrganizeError::FileMoveFailure {
                source: source.to_path_buf(),
                destination: target_dir.to_path_buf(),
                source_error: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "file has no name component",
                ),
            })?;

        let destination =
            resolve_collision(target_dir, file_name, &mut self.duplicate_counter, occupied);

        relocate(source, &destination).map_err(|e| OrganizeError::FileMoveFailure {
            source: source.to_path_buf(),
            destination: destination.clone(),
            source_error: e,
        })?;

        Ok(destination)
    }

    /// Every regular file under `root` that passes the filters, sorted by name
    /// within each directory. Symlinks are not followed and not organized.
    ///
    /// Hidden directories that are not descended into and entries that could
    /// not be read are returned alongside, so the run can report them.
    fn snapshot(&self, root: &Path) -> Snapshot {
        let mut snapshot = Snapshot::default();
        let mut walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    let error = OrganizeError::ReadDirFailed {
                        path: path.clone(),
                        source: e.into(),
                    };
                    warn!("{}", error);
                    snapshot.unreadable.push((path, error.to_string()));
                    continue;
                }
            };

            if entry.depth() > 0 && entry.file_type().is_dir() {
                if !self
                    .filters
                    .should_descend(&entry.file_name().to_string_lossy())
                {
                    walker.skip_current_dir();
                    snapshot.hidden_dirs.push(entry.into_path());
                }
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            let included = entry
                .path()
                .strip_prefix(root)
                .map(|relative| self.filters.should_include(relative))
                .unwrap_or(false);
            if included {
                snapshot.files.push(entry.into_path());
            } else {
                debug!("Excluded by filters: {}", entry.path().display());
            }
        }

        snapshot
    }

    /// Immediate subfolders of `parent`, split into visited and hidden ones.
    fn subfolders(&self, parent: &Path) -> OrganizeResult<(Vec<PathBuf>, Vec<PathBuf>)> {
        let entries = fs::read_dir(parent).map_err(|e| OrganizeError::ReadDirFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;

        let (mut folders, mut hidden): (Vec<PathBuf>, Vec<PathBuf>) = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .partition(|path| self.filters.should_descend(&display_name(path)));
        folders.sort();
        hidden.sort();

        Ok((folders, hidden))
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    files: Vec<PathBuf>,
    hidden_dirs: Vec<PathBuf>,
    unreadable: Vec<(PathBuf, String)>,
}

/// A classification key, plus the reason the date is unknown when the
/// modification time could not be read.
struct Classified {
    key: ClassificationKey,
    undated: Option<OrganizeError>,
}

fn validate_root(root: &Path) -> OrganizeResult<()> {
    let metadata = fs::metadata(root).map_err(|e| OrganizeError::InvalidRoot {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;

    if !metadata.is_dir() {
        return Err(OrganizeError::InvalidRoot {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    Ok(())
}

fn classify_file(path: &Path, sort_by_size: bool) -> OrganizeResult<Classified> {
    let metadata = fs::metadata(path).map_err(|e| OrganizeError::MetadataUnavailable {
        path: path.to_path_buf(),
        source: e,
    })?;

    let (modified, undated) = match metadata.modified() {
        Ok(time) => (Some(time), None),
        Err(e) => {
            let error = OrganizeError::TimestampUnavailable {
                path: path.to_path_buf(),
                source: e,
            };
            debug!("{}", error);
            (None, Some(error))
        }
    };

    Ok(Classified {
        key: ClassificationKey::new(path, modified, sort_by_size.then(|| metadata.len())),
        undated,
    })
}

/// Picks a free destination for `file_name` in `target_dir`.
///
/// On collision the per-name counter is bumped until a free `name_N.ext` is
/// found, so a number handed out earlier in the run is never reused.
fn resolve_collision(
    target_dir: &Path,
    file_name: &OsStr,
    counters: &mut HashMap<String, u32>,
    is_taken: impl Fn(&Path) -> bool,
) -> PathBuf {
    let candidate = target_dir.join(file_name);
    if !is_taken(&candidate) {
        return candidate;
    }

    let name = file_name.to_string_lossy().into_owned();
    let counter = counters.entry(name.clone()).or_insert(0);
    loop {
        *counter += 1;
        let candidate = target_dir.join(suffixed_file_name(&name, *counter));
        if !is_taken(&candidate) {
            return candidate;
        }
    }
}

/// True if anything (file, directory, dangling symlink) exists at `path`.
pub(crate) fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Renames `source` to `destination`, copying and deleting when the two are
/// on different filesystems.
pub(crate) fn relocate(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(
                "Rename of {} crosses devices, copying instead",
                source.display()
            );
            copy_then_remove(source, destination)
        }
        Err(e) => Err(e),
    }
}

/// Copies `source` to `destination` and removes the source.
///
/// On any failure the destination is removed again, so exactly one copy of
/// the file remains, at `source`.
fn copy_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    if let Err(copy_error) = fs::copy(source, destination) {
        discard_copy(destination);
        return Err(copy_error);
    }
    if let Err(remove_error) = fs::remove_file(source) {
        discard_copy(destination);
        return Err(remove_error);
    }
    Ok(())
}

fn discard_copy(destination: &Path) {
    match fs::remove_file(destination) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Could not remove partial copy {}: {}",
            destination.display(),
            e
        ),
    }
}

fn completion_banner(report: &OrganizeReport) -> String {
    format!(
        "Organization complete! {} moved, {} skipped, {} failed",
        report.moved_count(),
        report.skipped_count(),
        report.failed_count()
    )
}
