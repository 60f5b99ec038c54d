//! fim library crate
//!
//! This crate provides both a CLI binary and a library API for programmatic use:
//! hash a directory tree into a [`Snapshot`], persist it as a baseline, and
//! diff later scans against it.

pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod progress;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod signal;
pub mod snapshot;
pub mod store;
pub mod utils;

pub use digest::{digest_file, digest_named, HashAlgorithm};
pub use error::{FimError, Result};
pub use monitor::{Monitor, MonitorState};
pub use report::{ChangeReport, ReportSink};
pub use rules::{IgnoreEngine, IgnoreMatcher, RuleSet};
pub use scanner::{scan, scan_with_stats, ScanOptions, ScanStats};
pub use signal::CancellationToken;
pub use snapshot::{diff, ChangeSet, Snapshot};
pub use store::SnapshotStore;
