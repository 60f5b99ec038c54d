//! Poll loop
//!
//! [`Monitor`] repeatedly scans the watched root, diffs against the previous
//! snapshot, hands the result to a [`ReportSink`] and persists the new
//! baseline. Each tick runs scan -> diff -> report -> persist to completion
//! before the loop sleeps, so scans never overlap; a scan that overruns the
//! interval just delays the next one.

use crate::error::Result;
use crate::report::{ChangeReport, ReportSink};
use crate::scanner::{self, ScanOptions};
use crate::signal::CancellationToken;
use crate::snapshot::{self, Snapshot};
use crate::store::SnapshotStore;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default time between scans
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Upper bound on how long a cancellation can go unnoticed while sleeping
const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Scanning,
    Reporting,
    Sleeping,
    Stopped,
}

pub struct Monitor<'a> {
    root: PathBuf,
    options: ScanOptions,
    interval: Duration,
    max_cycles: Option<u64>,
    store: SnapshotStore,
    sink: &'a mut dyn ReportSink,
    cancel: CancellationToken,
    state: MonitorState,
    previous: Option<Snapshot>,
    cycles: u64,
}

impl<'a> Monitor<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        mut options: ScanOptions,
        store: SnapshotStore,
        sink: &'a mut dyn ReportSink,
    ) -> Self {
        let cancel = options.cancel.get_or_insert_with(CancellationToken::new).clone();
        Self {
            root: root.into(),
            options,
            interval: DEFAULT_INTERVAL,
            max_cycles: None,
            store,
            sink,
            cancel,
            state: MonitorState::Idle,
            previous: None,
            cycles: 0,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stop `run` after this many scan cycles
    pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Token that stops the loop at the next safe point
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan once and save the result as the new baseline
    pub fn initialize_baseline(&mut self) -> Result<Snapshot> {
        self.state = MonitorState::Scanning;
        let snapshot = match scanner::scan(&self.root, &self.options) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.state = MonitorState::Idle;
                return Err(e);
            }
        };

        self.state = MonitorState::Idle;
        self.store.save(&snapshot)?;
        self.sink.on_baseline(&self.root, snapshot.len());
        self.previous = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// One scan -> diff -> report -> persist step.
    ///
    /// The stored baseline is only replaced after the scan completes; a failed
    /// or cancelled scan leaves it untouched.
    pub fn tick(&mut self) -> Result<ChangeReport> {
        let previous = match self.previous.take() {
            Some(previous) => previous,
            None => self.store.load()?,
        };

        self.state = MonitorState::Scanning;
        let current = match scanner::scan(&self.root, &self.options) {
            Ok(current) => current,
            Err(e) => {
                self.previous = Some(previous);
                self.state = MonitorState::Idle;
                return Err(e);
            }
        };

        self.state = MonitorState::Reporting;
        let report = ChangeReport::new(snapshot::diff(&previous, &current), current.len());
        self.sink.on_cycle(&report);

        let saved = self.store.save(&current);
        self.state = MonitorState::Idle;
        if let Err(e) = saved {
            self.previous = Some(previous);
            return Err(e);
        }

        self.previous = Some(current);
        self.cycles += 1;
        Ok(report)
    }

    /// Poll until cancelled (or `max_cycles` is reached).
    ///
    /// Returns the number of completed cycles.
    pub fn run(&mut self) -> Result<u64> {
        self.sink
            .on_start(&self.root, self.interval, self.options.algorithm);

        if self.previous.is_none() {
            self.previous = Some(self.store.load()?);
        }

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.tick() {
                Ok(_) => {}
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    self.state = MonitorState::Stopped;
                    return Err(e);
                }
            }

            if self.max_cycles.is_some_and(|max| self.cycles >= max) {
                break;
            }

            self.state = MonitorState::Sleeping;
            if !self.sleep() {
                break;
            }
            self.state = MonitorState::Idle;
        }

        self.state = MonitorState::Stopped;
        tracing::info!("Monitor stopped after {} cycles", self.cycles);
        Ok(self.cycles)
    }

    /// Sleep for the interval in short slices; false if cancelled meanwhile
    fn sleep(&self) -> bool {
        let deadline = Instant::now() + self.interval;
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemorySink;
    use crate::utils;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        watched: TempDir,
        state_dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                watched: TempDir::new().unwrap(),
                state_dir: TempDir::new().unwrap(),
            }
        }

        fn store(&self) -> SnapshotStore {
            SnapshotStore::new(self.state_dir.path().join("file_hashes.json"))
        }

        fn key(&self, name: &str) -> String {
            utils::path_key(&self.watched.path().join(name))
        }
    }

    #[test]
    fn test_initialize_baseline_saves_snapshot() {
        let fx = Fixture::new();
        fs::write(fx.watched.path().join("a.txt"), "A").unwrap();

        let mut sink = MemorySink::new();
        let snapshot = {
            let mut monitor =
                Monitor::new(fx.watched.path(), ScanOptions::default(), fx.store(), &mut sink);
            monitor.initialize_baseline().unwrap()
        };

        assert_eq!(snapshot.len(), 1);
        assert_eq!(fx.store().load().unwrap(), snapshot);
        assert_eq!(sink.baselines, vec![1]);
    }

    #[test]
    fn test_tick_lifecycle() {
        let fx = Fixture::new();
        let file = fx.watched.path().join("a.txt");
        let mut sink = MemorySink::new();

        {
            let mut monitor =
                Monitor::new(fx.watched.path(), ScanOptions::default(), fx.store(), &mut sink);

            let report = monitor.tick().unwrap();
            assert!(!report.has_changes());

            fs::write(&file, "A").unwrap();
            let report = monitor.tick().unwrap();
            assert_eq!(report.changes.added, vec![fx.key("a.txt")]);

            fs::write(&file, "B").unwrap();
            let report = monitor.tick().unwrap();
            assert_eq!(report.changes.modified, vec![fx.key("a.txt")]);

            fs::remove_file(&file).unwrap();
            let report = monitor.tick().unwrap();
            assert_eq!(report.changes.removed, vec![fx.key("a.txt")]);

            assert_eq!(monitor.cycles(), 4);
            assert_eq!(monitor.state(), MonitorState::Idle);
        }

        assert_eq!(sink.reports.len(), 4);
        assert_eq!(sink.changed().count(), 3);
    }

    #[test]
    fn test_tick_diffs_against_stored_baseline() {
        let fx = Fixture::new();
        fs::write(fx.watched.path().join("old.txt"), "old").unwrap();

        let mut sink = MemorySink::new();
        {
            let mut monitor =
                Monitor::new(fx.watched.path(), ScanOptions::default(), fx.store(), &mut sink);
            monitor.initialize_baseline().unwrap();
        }

        fs::write(fx.watched.path().join("new.txt"), "new").unwrap();

        let mut sink = MemorySink::new();
        let mut monitor =
            Monitor::new(fx.watched.path(), ScanOptions::default(), fx.store(), &mut sink);
        let report = monitor.tick().unwrap();
        assert_eq!(report.changes.added, vec![fx.key("new.txt")]);
        assert!(report.changes.removed.is_empty());
    }

    #[test]
    fn test_run_stops_after_max_cycles() {
        let fx = Fixture::new();
        fs::write(fx.watched.path().join("a.txt"), "A").unwrap();

        let mut sink = MemorySink::new();
        let cycles = {
            let mut monitor =
                Monitor::new(fx.watched.path(), ScanOptions::default(), fx.store(), &mut sink)
                    .with_interval(Duration::from_millis(1))
                    .with_max_cycles(Some(3));
            let cycles = monitor.run().unwrap();
            assert_eq!(monitor.state(), MonitorState::Stopped);
            cycles
        };

        assert_eq!(cycles, 3);
        assert!(sink.started);
        assert_eq!(sink.reports.len(), 3);
        // Only the first cycle sees the file as new
        assert_eq!(sink.changed().count(), 1);
    }

    #[test]
    fn test_cancel_before_run_writes_nothing() {
        let fx = Fixture::new();
        fs::write(fx.watched.path().join("a.txt"), "A").unwrap();

        let mut sink = MemorySink::new();
        let mut monitor =
            Monitor::new(fx.watched.path(), ScanOptions::default(), fx.store(), &mut sink);
        monitor.cancel_token().cancel();

        assert_eq!(monitor.run().unwrap(), 0);
        assert!(!fx.store().exists());
    }

    #[test]
    fn test_cancelled_tick_leaves_stored_baseline_untouched() {
        for parallel in [false, true] {
            let fx = Fixture::new();
            fs::write(fx.watched.path().join("a.txt"), "A").unwrap();
            fs::write(fx.watched.path().join("b.txt"), "B").unwrap();
            let options = ScanOptions::default().with_parallel(parallel);

            let mut sink = MemorySink::new();
            {
                let mut monitor =
                    Monitor::new(fx.watched.path(), options, fx.store(), &mut sink);
                monitor.initialize_baseline().unwrap();
                let before = fs::read(fx.store().path()).unwrap();

                fs::write(fx.watched.path().join("a.txt"), "changed").unwrap();
                fs::remove_file(fx.watched.path().join("b.txt")).unwrap();
                fs::write(fx.watched.path().join("c.txt"), "C").unwrap();
                monitor.cancel_token().cancel();

                let err = monitor.tick().unwrap_err();
                assert!(err.is_cancelled());
                assert_eq!(monitor.cycles(), 0);
                assert_eq!(monitor.state(), MonitorState::Idle);
                assert_eq!(fs::read(fx.store().path()).unwrap(), before);
            }
            assert!(sink.reports.is_empty());
        }
    }

    #[test]
    fn test_cancel_interrupts_sleep() {
        let fx = Fixture::new();
        let mut sink = MemorySink::new();
        let mut monitor =
            Monitor::new(fx.watched.path(), ScanOptions::default(), fx.store(), &mut sink)
                .with_interval(Duration::from_secs(3600));

        let token = monitor.cancel_token();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            token.cancel();
        });

        let started = Instant::now();
        let cycles = monitor.run().unwrap();
        canceller.join().unwrap();

        assert_eq!(cycles, 1);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn test_missing_root_fails_without_writing() {
        let fx = Fixture::new();
        let missing = fx.watched.path().join("gone");

        let mut sink = MemorySink::new();
        let mut monitor = Monitor::new(&missing, ScanOptions::default(), fx.store(), &mut sink);
        assert!(monitor.tick().is_err());
        assert!(!fx.store().exists());
        assert!(sink.reports.is_empty());
    }
}
