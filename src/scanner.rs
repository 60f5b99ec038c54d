use crate::digest::{digest_file, HashAlgorithm};
use crate::error::{FimError, Result};
use crate::rules::{self, IgnoreEngine, IgnoreMatcher, RuleSet, DEFAULT_IGNORE_FILE};
use crate::signal::CancellationToken;
use crate::snapshot::Snapshot;
use crate::utils;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Settings for one scan of the watched tree
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub algorithm: HashAlgorithm,
    pub engine: IgnoreEngine,
    /// Rules file name inside the root; files with this name are never hashed
    pub ignore_file: String,
    /// Hash files on the rayon pool instead of the calling thread
    pub parallel: bool,
    pub cancel: Option<CancellationToken>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            engine: IgnoreEngine::default(),
            ignore_file: DEFAULT_IGNORE_FILE.to_string(),
            parallel: false,
            cancel: None,
        }
    }
}

impl ScanOptions {
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_engine(mut self, engine: IgnoreEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

/// Counters for a completed scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Non-directory entries visited
    pub files_seen: usize,
    pub files_hashed: usize,
    /// Files skipped by a rule or because they are the rules file
    pub files_ignored: usize,
    pub dirs_pruned: usize,
    /// Files that vanished or could not be read
    pub files_unreadable: usize,
}

/// Scan `root` and build a path -> digest snapshot
pub fn scan(root: &Path, options: &ScanOptions) -> Result<Snapshot> {
    scan_with_stats(root, options).map(|(snapshot, _)| snapshot)
}

/// Scan `root`, also returning traversal counters.
///
/// Ignored directories are pruned before descending, so nothing below them can
/// appear in the snapshot. Files that cannot be read are left out without
/// failing the scan. A cancelled scan returns [`FimError::Cancelled`] and
/// publishes nothing.
pub fn scan_with_stats(root: &Path, options: &ScanOptions) -> Result<(Snapshot, ScanStats)> {
    let root = resolve_root(root)?;

    let rules = RuleSet::load(&rules::rules_path(&root, &options.ignore_file))?;
    let matcher = options.engine.compile(&root, &rules);
    tracing::debug!(
        "Loaded {} ignore rules for {} ({} engine)",
        rules.len(),
        root.display(),
        options.engine
    );

    let (candidates, mut stats) = collect_files(&root, matcher.as_ref(), options)?;

    let digested: Vec<Option<(String, String)>> = if options.parallel {
        candidates
            .par_iter()
            .map(|path| hash_candidate(path, options))
            .collect::<Result<_>>()?
    } else {
        candidates
            .iter()
            .map(|path| hash_candidate(path, options))
            .collect::<Result<_>>()?
    };

    let mut snapshot = Snapshot::new();
    for (key, digest) in digested.into_iter().flatten() {
        stats.files_hashed += 1;
        if snapshot.contains(&key) {
            tracing::warn!("Two files map to the same path key {}; keeping one", key);
        }
        snapshot.insert(key, digest);
    }
    stats.files_unreadable = candidates.len() - stats.files_hashed;

    tracing::info!(
        "Scanned {}: {} files hashed, {} ignored, {} directories pruned, {} unreadable",
        root.display(),
        stats.files_hashed,
        stats.files_ignored,
        stats.dirs_pruned,
        stats.files_unreadable
    );

    Ok((snapshot, stats))
}

/// Check the root is a directory and make it absolute
fn resolve_root(root: &Path) -> Result<PathBuf> {
    if !root.is_dir() {
        return Err(FimError::InvalidRoot(root.to_path_buf()));
    }
    utils::absolutize(root).map_err(|_| FimError::InvalidRoot(root.to_path_buf()))
}

/// Walk the tree and return the files that should be hashed
fn collect_files(
    root: &Path,
    matcher: &dyn IgnoreMatcher,
    options: &ScanOptions,
) -> Result<(Vec<PathBuf>, ScanStats)> {
    let mut stats = ScanStats::default();
    let mut dirs_pruned = 0usize;
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            // Directories are only checked here, before descending
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let rel = rules::relative_key(root, entry.path());
            if matcher.is_ignored(&rel, true) {
                tracing::debug!("Pruning ignored directory {}", rel);
                dirs_pruned += 1;
                return false;
            }
            true
        });

    for entry in walker {
        if options.is_cancelled() {
            return Err(FimError::Cancelled);
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(FimError::storage(root, std::io::Error::from(e)));
            }
            Err(e) => {
                tracing::debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }

        if file_type.is_symlink() {
            // Follow file symlinks like a plain open would; never descend into
            // symlinked directories
            match std::fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!("Skipping dangling symlink {}: {}", entry.path().display(), e);
                    continue;
                }
            }
        } else if !file_type.is_file() {
            tracing::debug!("Skipping special file {}", entry.path().display());
            continue;
        }

        stats.files_seen += 1;

        if entry.file_name().to_string_lossy() == options.ignore_file.as_str() {
            stats.files_ignored += 1;
            continue;
        }

        let rel = rules::relative_key(root, entry.path());
        if matcher.is_ignored(&rel, false) {
            stats.files_ignored += 1;
            continue;
        }

        files.push(entry.into_path());
    }

    stats.dirs_pruned = dirs_pruned;
    Ok((files, stats))
}

fn hash_candidate(path: &Path, options: &ScanOptions) -> Result<Option<(String, String)>> {
    if options.is_cancelled() {
        return Err(FimError::Cancelled);
    }
    Ok(digest_file(path, options.algorithm).map(|digest| (utils::path_key(path), digest)))
}
