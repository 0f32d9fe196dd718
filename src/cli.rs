//! Command-line interface module for dirbucket.
//!
//! This module handles all CLI-related functionality including:
//! - Command parsing (clap derive)
//! - One-shot organize, dry-run and batch commands
//! - The interactive session, which keeps the undo journal alive between
//!   commands
//! - Saving log transcripts and JSON reports

use crate::config::Config;
use crate::file_organizer::{FileOrganizer, OrganizeReport, OrganizerState};
use crate::output::{ConsoleReporter, OutputFormatter};
use crate::report;
use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Bucket files into extension/year/month folders, with undo of the last run.
#[derive(Debug, Parser)]
#[command(name = "dirbucket", version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Organize a folder tree in place
    Organize {
        dir: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        /// Show where files would go without moving anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Organize every immediate subfolder of a folder
    Batch {
        dir: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Start an interactive session (organize, undo, save-log, ...)
    Shell,
}

/// Options shared by the one-shot organize commands.
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Add a size folder (Small, Medium, Large, Very_Large) below the month
    #[arg(long)]
    pub by_size: bool,

    /// Write a JSON report of the run
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Save the run's log lines to a text file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

/// A command typed into the interactive session.
#[derive(Debug, Parser)]
#[command(name = "dirbucket", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Debug, Subcommand)]
enum ShellCommand {
    /// Organize a folder tree in place
    Organize {
        dir: PathBuf,
        #[arg(long)]
        by_size: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Organize every immediate subfolder of a folder
    Batch {
        dir: PathBuf,
        #[arg(long)]
        by_size: bool,
    },
    /// Move the files of the last run back
    Undo,
    /// Show whether there is a run to undo
    Status,
    /// Save everything logged in this session to a text file
    SaveLog { path: PathBuf },
    /// Write a JSON report of the last run
    Report { path: PathBuf },
    /// Leave the session
    #[command(alias = "exit")]
    Quit,
}

/// Whether the session keeps reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFlow {
    Continue,
    Quit,
}

/// Runs the CLI application for a parsed command line.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use dirbucket::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["dirbucket", "organize", "/path/to/directory", "--by-size"]);
/// if let Err(e) = run_cli(cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(cli: Cli) -> Result<(), String> {
    let config = Config::load(cli.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;

    match cli.command {
        Command::Organize { dir, run, dry_run } => {
            let mut session = Session::new(config)?;
            if dry_run {
                session.dry_run(&dir, run.by_size)
            } else {
                session.organize(&dir, run.by_size)?;
                OutputFormatter::plain(
                    "Undo is only available inside `dirbucket shell`; the journal is not kept after exit.",
                );
                session.write_outputs(&run)
            }
        }
        Command::Batch { dir, run } => {
            let mut session = Session::new(config)?;
            session.batch(&dir, run.by_size)?;
            session.write_outputs(&run)
        }
        Command::Shell => {
            let stdin = io::stdin();
            run_shell(config, stdin.lock())
        }
    }
}

/// Reads session commands line by line until `quit` or end of input.
///
/// Errors from individual commands are printed and the session continues.
pub fn run_shell<R: BufRead>(config: Config, input: R) -> Result<(), String> {
    let mut session = Session::new(config)?;
    OutputFormatter::info("Welcome to dirbucket - type 'help' for commands, 'quit' to leave.");

    prompt();
    for line in input.lines() {
        let line = line.map_err(|e| format!("Error reading input: {}", e))?;
        match session.execute(&line) {
            Ok(ShellFlow::Quit) => break,
            Ok(ShellFlow::Continue) => {}
            Err(e) => OutputFormatter::error(&e),
        }
        prompt();
    }

    Ok(())
}

fn prompt() {
    print!("dirbucket> ");
    io::stdout().flush().ok();
}

/// An organizer plus everything logged since the session started.
///
/// The journal of the last run lives here, so `undo` works for as long as the
/// session does.
pub struct Session {
    config: Config,
    organizer: FileOrganizer,
    reporter: ConsoleReporter,
    last_run: Vec<OrganizeReport>,
}

impl Session {
    pub fn new(config: Config) -> Result<Self, String> {
        let organizer = FileOrganizer::from_config(&config)
            .map_err(|e| format!("Error compiling filters: {}", e))?;
        Ok(Self {
            config,
            organizer,
            reporter: ConsoleReporter::new(),
            last_run: Vec::new(),
        })
    }

    pub fn organizer(&self) -> &FileOrganizer {
        &self.organizer
    }

    /// Reports of the most recent organize or batch run.
    pub fn last_run(&self) -> &[OrganizeReport] {
        &self.last_run
    }

    /// Parses and runs one line of session input.
    pub fn execute(&mut self, line: &str) -> Result<ShellFlow, String> {
        let words =
            shlex::split(line).ok_or_else(|| format!("Unbalanced quotes in: {}", line))?;
        if words.is_empty() {
            return Ok(ShellFlow::Continue);
        }

        let parsed = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(e) => {
                if matches!(
                    e.kind(),
                    ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    e.print().ok();
                    return Ok(ShellFlow::Continue);
                }
                return Err(e.to_string().trim_end().to_string());
            }
        };

        match parsed.command {
            ShellCommand::Organize {
                dir,
                by_size,
                dry_run,
            } => {
                if dry_run {
                    self.dry_run(&dir, by_size)?;
                } else {
                    self.organize(&dir, by_size)?;
                    OutputFormatter::plain("Type 'undo' to revert this run.");
                }
            }
            ShellCommand::Batch { dir, by_size } => self.batch(&dir, by_size)?,
            ShellCommand::Undo => self.undo(),
            ShellCommand::Status => self.status(),
            ShellCommand::SaveLog { path } => self.save_log(&path)?,
            ShellCommand::Report { path } => self.write_report(&path)?,
            ShellCommand::Quit => return Ok(ShellFlow::Quit),
        }

        Ok(ShellFlow::Continue)
    }

    /// Organizes `dir` and prints a summary.
    pub fn organize(&mut self, dir: &Path, by_size: bool) -> Result<(), String> {
        let sort_by_size = by_size || self.config.organize.sort_by_size;
        let report = self
            .organizer
            .organize(dir, sort_by_size, &mut self.reporter)
            .map_err(|e| e.to_string())?;

        print_summary(std::slice::from_ref(&report));
        self.last_run = vec![report];
        Ok(())
    }

    /// Organizes every subfolder of `dir` as one undoable run.
    pub fn batch(&mut self, dir: &Path, by_size: bool) -> Result<(), String> {
        let sort_by_size = by_size || self.config.organize.sort_by_size;
        let reports = self
            .organizer
            .organize_batch(dir, sort_by_size, &mut self.reporter)
            .map_err(|e| e.to_string())?;

        if !reports.is_empty() {
            print_summary(&reports);
        }
        self.last_run = reports;
        Ok(())
    }

    /// Prints where files would go without moving anything.
    pub fn dry_run(&self, dir: &Path, by_size: bool) -> Result<(), String> {
        let sort_by_size = by_size || self.config.organize.sort_by_size;
        let plan = self
            .organizer
            .plan(dir, sort_by_size)
            .map_err(|e| e.to_string())?;

        OutputFormatter::dry_run_notice(&format!("Analyzing contents of: {}", dir.display()));
        if plan.moves.is_empty() && plan.skipped.is_empty() {
            OutputFormatter::plain("No files found to organize.");
            return Ok(());
        }

        for planned in &plan.moves {
            let relative = planned
                .destination
                .strip_prefix(&plan.root)
                .unwrap_or(&planned.destination);
            OutputFormatter::plain(&format!(
                " - {}\n   → Would move to {}",
                planned.source.display(),
                relative.display()
            ));
        }
        for (path, reason) in &plan.skipped {
            OutputFormatter::plain(&format!(" - {} (left in place: {})", path.display(), reason));
        }

        OutputFormatter::dry_run_notice(&format!(
            "{} file(s) would move, {} left in place. No files were modified.",
            plan.moves.len(),
            plan.skipped.len()
        ));
        Ok(())
    }

    /// Reverts the last run and prints what happened.
    pub fn undo(&mut self) {
        let report = self.organizer.undo(&mut self.reporter);
        if report.nothing_to_undo {
            return;
        }

        OutputFormatter::header("UNDO");
        OutputFormatter::plain(&format!("  Restored: {}", report.restored_files()));

        let failures = report.failed_restores();
        if !failures.is_empty() {
            OutputFormatter::warning(&format!("  Failed: {}", failures.len()));
            for (path, reason) in &failures {
                OutputFormatter::plain(&format!("    - {}: {}", path.display(), reason));
            }
            if self.organizer.state() == OrganizerState::Journaled {
                OutputFormatter::plain("Failed entries were kept; fix the issues and run 'undo' again.");
            }
        }
    }

    pub fn status(&self) {
        match self.organizer.state() {
            OrganizerState::Idle => OutputFormatter::plain("Nothing to undo."),
            OrganizerState::Journaled => OutputFormatter::plain(&format!(
                "{} move(s) from the last run can be undone.",
                self.organizer.journal().len()
            )),
        }
    }

    /// Saves the session transcript to `path`.
    pub fn save_log(&self, path: &Path) -> Result<(), String> {
        let saved = self
            .reporter
            .transcript()
            .save(path)
            .map_err(|e| e.to_string())?;

        if saved {
            OutputFormatter::success(&format!("Log saved to {}", path.display()));
        } else {
            OutputFormatter::warning("Log is empty.");
        }
        Ok(())
    }

    /// Writes the JSON report of the last run to `path`.
    pub fn write_report(&self, path: &Path) -> Result<(), String> {
        if self.last_run.is_empty() {
            OutputFormatter::warning("No run to report yet.");
            return Ok(());
        }
        report::write_json(path, &self.last_run).map_err(|e| e.to_string())?;
        OutputFormatter::success(&format!("Report written to {}", path.display()));
        Ok(())
    }

    /// Writes the report and log file requested on the command line.
    pub fn write_outputs(&self, run: &RunArgs) -> Result<(), String> {
        if let Some(path) = &run.report {
            self.write_report(path)?;
        }
        if let Some(path) = &run.log_file {
            self.save_log(path)?;
        }
        Ok(())
    }
}

fn print_summary(reports: &[OrganizeReport]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut moved = 0;
    let mut failed = 0;

    for report in reports {
        for (bucket, count) in report.bucket_counts() {
            *counts.entry(bucket).or_insert(0) += count;
        }
        moved += report.moved_count();
        failed += report.failed_count();
    }

    if moved > 0 {
        OutputFormatter::summary_table(&counts, moved);
    }
    if failed > 0 {
        OutputFormatter::warning(&format!(
            "{} file(s) could not be organized. Please review errors above.",
            failed
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
        ShellLine::command().debug_assert();
    }

    #[test]
    fn test_parse_organize_command() {
        let cli = Cli::parse_from([
            "dirbucket",
            "organize",
            "/data",
            "--by-size",
            "--report",
            "out.json",
        ]);

        match cli.command {
            Command::Organize { dir, run, dry_run } => {
                assert_eq!(dir, PathBuf::from("/data"));
                assert!(run.by_size);
                assert_eq!(run.report, Some(PathBuf::from("out.json")));
                assert!(run.log_file.is_none());
                assert!(!dry_run);
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_config_after_subcommand() {
        let cli = Cli::parse_from(["dirbucket", "batch", "/data", "--config", "rc.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("rc.toml")));
        assert!(matches!(cli.command, Command::Batch { .. }));
    }

    #[test]
    fn test_shell_quit_and_exit() {
        let mut session = Session::new(Config::default()).unwrap();
        assert_eq!(session.execute("quit"), Ok(ShellFlow::Quit));
        assert_eq!(session.execute("exit"), Ok(ShellFlow::Quit));
    }

    #[test]
    fn test_shell_blank_line_is_ignored() {
        let mut session = Session::new(Config::default()).unwrap();
        assert_eq!(session.execute("   "), Ok(ShellFlow::Continue));
    }

    #[test]
    fn test_shell_unknown_command_is_an_error() {
        let mut session = Session::new(Config::default()).unwrap();
        assert!(session.execute("frobnicate").is_err());
    }

    #[test]
    fn test_shell_unbalanced_quotes_are_an_error() {
        let mut session = Session::new(Config::default()).unwrap();
        let result = session.execute("organize \"My Files");
        assert!(result.unwrap_err().contains("Unbalanced quotes"));
    }

    #[test]
    fn test_shell_organizes_folder_with_spaces() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let folder = temp_dir.path().join("My Files");
        std::fs::create_dir(&folder).expect("Failed to create folder");
        std::fs::write(folder.join("a.txt"), "a").expect("Failed to write file");

        let mut session = Session::new(Config::default()).unwrap();
        let line = format!("organize '{}'", folder.display());
        assert_eq!(session.execute(&line), Ok(ShellFlow::Continue));
        assert!(!folder.join("a.txt").exists());
        assert_eq!(session.last_run()[0].moved_count(), 1);

        assert_eq!(session.execute("undo"), Ok(ShellFlow::Continue));
        assert!(folder.join("a.txt").exists());
    }

    #[test]
    fn test_shell_undo_with_nothing_to_undo() {
        let mut session = Session::new(Config::default()).unwrap();
        assert_eq!(session.execute("undo"), Ok(ShellFlow::Continue));
        assert_eq!(session.organizer().state(), OrganizerState::Idle);
    }
}
