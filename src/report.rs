//! Reporting sinks
//!
//! The monitor hands every scan cycle's [`ChangeReport`] to a [`ReportSink`].
//! Sinks own all rendering decisions (colors, JSON, quiet mode), so the engine
//! never touches the terminal directly.

use crate::digest::HashAlgorithm;
use crate::snapshot::ChangeSet;
use crate::utils;
use chrono::{DateTime, Local};
use colored::*;
use indicatif::ProgressBar;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Output verbosity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Quiet,   // Only errors
    Normal,  // Change reports
    Verbose, // Also report quiet cycles
}

/// Result of one scan cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeReport {
    pub timestamp: DateTime<Local>,
    /// Files in the new snapshot
    pub files: usize,
    #[serde(flatten)]
    pub changes: ChangeSet,
}

impl ChangeReport {
    pub fn new(changes: ChangeSet, files: usize) -> Self {
        Self {
            timestamp: Local::now(),
            files,
            changes,
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn timestamp_label(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

pub trait ReportSink {
    /// Monitoring is about to start
    fn on_start(&mut self, _root: &Path, _interval: Duration, _algorithm: HashAlgorithm) {}

    /// A baseline was written in init mode
    fn on_baseline(&mut self, _root: &Path, _files: usize) {}

    /// Called once per scan cycle, with or without changes
    fn on_cycle(&mut self, report: &ChangeReport);
}

/// Human-readable terminal output, mirrored to the log
pub struct ConsoleSink {
    mode: OutputMode,
    color: bool,
    /// Spinner shown until the first baseline or cycle line is printed
    progress: Option<ProgressBar>,
}

impl ConsoleSink {
    pub fn new(mode: OutputMode, color: bool) -> Self {
        Self {
            mode,
            color,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }

    fn clear_progress(&mut self) {
        if let Some(pb) = self.progress.take() {
            pb.finish_and_clear();
        }
    }

    fn emit(&self, line: &str, color: Option<Color>) {
        tracing::info!("{}", line);
        if self.mode == OutputMode::Quiet {
            return;
        }
        match color {
            Some(color) if self.color => println!("{}", line.color(color)),
            _ => println!("{}", line),
        }
    }

    fn print(&self, line: &str) {
        if self.mode != OutputMode::Quiet {
            println!("{}", line);
        }
    }
}

impl ReportSink for ConsoleSink {
    fn on_start(&mut self, root: &Path, interval: Duration, algorithm: HashAlgorithm) {
        tracing::info!(
            "Monitoring {} every {}s using {}",
            utils::display_path(root),
            interval.as_secs(),
            algorithm
        );
        self.print(&format!(
            "[*] Monitoring {} every {}s using {}...",
            utils::display_path(root),
            interval.as_secs(),
            algorithm.as_str().to_uppercase()
        ));
    }

    fn on_baseline(&mut self, _root: &Path, files: usize) {
        self.clear_progress();
        tracing::info!("Baseline initialized with {} files", files);
        self.print("[*] Baseline created and saved.");
    }

    fn on_cycle(&mut self, report: &ChangeReport) {
        self.clear_progress();
        if !report.has_changes() {
            if self.mode == OutputMode::Verbose {
                println!("[{}] No changes ({} files)", report.timestamp_label(), report.files);
            }
            return;
        }

        self.print(&format!("\n[{}] Changes detected:", report.timestamp_label()));

        let changes = &report.changes;
        if !changes.added.is_empty() {
            self.emit(&format!("  [+] Added: {}", changes.added.join(", ")), Some(Color::Green));
        }
        if !changes.removed.is_empty() {
            self.emit(&format!("  [-] Removed: {}", changes.removed.join(", ")), Some(Color::Red));
        }
        if !changes.modified.is_empty() {
            self.emit(
                &format!("  [!] Modified: {}", changes.modified.join(", ")),
                Some(Color::Yellow),
            );
        }
    }
}

/// One JSON object per changed cycle, for scripting
pub struct JsonSink<W: Write> {
    out: W,
    include_quiet_cycles: bool,
}

impl JsonSink<std::io::Stdout> {
    pub fn stdout(include_quiet_cycles: bool) -> Self {
        Self::new(std::io::stdout(), include_quiet_cycles)
    }
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W, include_quiet_cycles: bool) -> Self {
        Self {
            out,
            include_quiet_cycles,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for JsonSink<W> {
    fn on_baseline(&mut self, _root: &Path, files: usize) {
        tracing::info!("Baseline initialized with {} files", files);
    }

    fn on_cycle(&mut self, report: &ChangeReport) {
        if report.has_changes() {
            tracing::info!("Changes detected: {}", report.changes.summary());
        } else if !self.include_quiet_cycles {
            return;
        }

        let written = serde_json::to_writer(&mut self.out, report)
            .map_err(std::io::Error::from)
            .and_then(|_| writeln!(self.out))
            .and_then(|_| self.out.flush());
        if let Err(e) = written {
            tracing::warn!("Failed to write JSON report: {}", e);
        }
    }
}

/// Collects reports in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub reports: Vec<ChangeReport>,
    pub baselines: Vec<usize>,
    pub started: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports that carried at least one change
    pub fn changed(&self) -> impl Iterator<Item = &ChangeReport> {
        self.reports.iter().filter(|r| r.has_changes())
    }
}

impl ReportSink for MemorySink {
    fn on_start(&mut self, _root: &Path, _interval: Duration, _algorithm: HashAlgorithm) {
        self.started = true;
    }

    fn on_baseline(&mut self, _root: &Path, files: usize) {
        self.baselines.push(files);
    }

    fn on_cycle(&mut self, report: &ChangeReport) {
        self.reports.push(report.clone());
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn on_cycle(&mut self, _report: &ChangeReport) {}
}
