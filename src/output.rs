//! Output formatting and the sinks that organize runs report through.
//!
//! The organizer never prints anything itself. It reports progress to a
//! [`ProgressSink`] and human-readable events to a [`LogSink`]; the CLI plugs in
//! a [`ConsoleReporter`] that styles them for the terminal and keeps a
//! [`Transcript`] that can be saved to disk.

use crate::file_organizer::{OrganizeError, OrganizeResult};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    /// Symbol prefixed to transcript lines of this level.
    fn marker(&self) -> Option<&'static str> {
        match self {
            LogLevel::Info => None,
            LogLevel::Success => Some("✓"),
            LogLevel::Warning => Some("⚠"),
            LogLevel::Error => Some("✗"),
        }
    }
}

/// Receives `(current, total)` after each processed file.
///
/// `total` is fixed by `start` before the first file is touched.
pub trait ProgressSink {
    fn start(&mut self, _total: usize) {}
    fn advance(&mut self, current: usize, total: usize);
    fn finish(&mut self) {}
}

/// Receives one human-readable line per event.
pub trait LogSink {
    fn log(&mut self, level: LogLevel, line: &str);
}

/// Both sinks at once, as taken by the organizer's long-running operations.
pub trait RunObserver: ProgressSink + LogSink {}

impl<T: ProgressSink + LogSink + ?Sized> RunObserver for T {}

/// A sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn advance(&mut self, _current: usize, _total: usize) {}
}

impl LogSink for NullSink {
    fn log(&mut self, _level: LogLevel, _line: &str) {}
}

/// Accumulated log lines, in the order they were emitted.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the transcript as a single newline-terminated text block.
    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        text
    }

    /// Writes the transcript to `path`.
    ///
    /// Returns `Ok(false)` without creating a file when there is nothing to save.
    pub fn save(&self, path: &Path) -> OrganizeResult<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        fs::write(path, self.text()).map_err(|e| OrganizeError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(true)
    }
}

impl LogSink for Transcript {
    fn log(&mut self, level: LogLevel, line: &str) {
        let entry = match level.marker() {
            Some(marker) => format!("{} {}", marker, line),
            None => line.to_string(),
        };
        self.lines.push(entry);
    }
}

impl ProgressSink for Transcript {
    fn advance(&mut self, _current: usize, _total: usize) {}
}

/// Terminal sink: a progress bar while a run is active, styled log lines, and
/// a transcript of everything logged.
#[derive(Default)]
pub struct ConsoleReporter {
    bar: Option<ProgressBar>,
    transcript: Transcript,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    fn print(level: LogLevel, line: &str) {
        match level {
            LogLevel::Info => OutputFormatter::info(line),
            LogLevel::Success => OutputFormatter::success(line),
            LogLevel::Warning => OutputFormatter::warning(line),
            LogLevel::Error => OutputFormatter::error(line),
        }
    }
}

impl ProgressSink for ConsoleReporter {
    fn start(&mut self, total: usize) {
        self.bar = Some(OutputFormatter::create_progress_bar(total as u64));
    }

    fn advance(&mut self, current: usize, _total: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(current as u64);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl LogSink for ConsoleReporter {
    fn log(&mut self, level: LogLevel, line: &str) {
        self.transcript.log(level, line);
        match &self.bar {
            Some(bar) => bar.suspend(|| Self::print(level, line)),
            None => Self::print(level, line),
        }
    }
}

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for operations
/// - Summary tables with statistics
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dirbucket::output::OutputFormatter;
    /// OutputFormatter::success("Moved: photo.jpg");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for `total` files.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dirbucket::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints a summary table with file counts per extension folder.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dirbucket::output::OutputFormatter;
    /// use std::collections::HashMap;
    ///
    /// let mut counts = HashMap::new();
    /// counts.insert("jpg".to_string(), 15);
    /// counts.insert("pdf".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(bucket_counts: &HashMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let mut buckets: Vec<_> = bucket_counts.iter().collect();
        buckets.sort_by_key(|&(name, _)| name);

        let max_bucket_len = buckets
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(6); // "Folder"

        println!(
            "{:<width$} | {}",
            "Folder".bold(),
            "Files".bold(),
            width = max_bucket_len
        );
        println!("{}", "-".repeat(max_bucket_len + 10));

        for (bucket, count) in &buckets {
            println!(
                "{:<width$} | {} {}",
                bucket,
                count.to_string().green(),
                plural_files(**count),
                width = max_bucket_len
            );
        }

        println!("{}", "-".repeat(max_bucket_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural_files(total_files),
            width = max_bucket_len
        );
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn plural_files(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_transcript_prefixes_levels() {
        let mut transcript = Transcript::new();
        transcript.log(LogLevel::Info, "Organizing: /tmp/x");
        transcript.log(LogLevel::Success, "Moved: a.txt");
        transcript.log(LogLevel::Error, "Failed: b.txt");

        assert_eq!(
            transcript.lines(),
            &[
                "Organizing: /tmp/x".to_string(),
                "✓ Moved: a.txt".to_string(),
                "✗ Failed: b.txt".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_transcript_is_not_saved() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("log.txt");

        let saved = Transcript::new().save(&path).expect("Save failed");
        assert!(!saved);
        assert!(!path.exists());
    }

    #[test]
    fn test_transcript_save_writes_lines() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("log.txt");

        let mut transcript = Transcript::new();
        transcript.log(LogLevel::Warning, "Nothing to undo");
        assert!(transcript.save(&path).expect("Save failed"));

        let content = fs::read_to_string(&path).expect("Failed to read log");
        assert_eq!(content, "⚠ Nothing to undo\n");
    }

    #[test]
    fn test_console_reporter_keeps_transcript() {
        let mut reporter = ConsoleReporter::new();
        reporter.start(2);
        reporter.log(LogLevel::Success, "Moved: a.txt");
        reporter.advance(1, 2);
        reporter.finish();

        assert_eq!(reporter.transcript().lines().len(), 1);
    }
}
