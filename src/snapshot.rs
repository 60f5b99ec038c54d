//! Snapshots and change detection
//!
//! A [`Snapshot`] maps absolute file paths to hex digests. Two snapshots are
//! compared with [`diff`], which yields the added, removed and modified paths.
//! The hash algorithm is not recorded; callers only compare snapshots taken
//! with the same one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point-in-time mapping of absolute path -> hex digest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, digest: impl Into<String>) {
        self.entries.insert(path.into(), digest.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths in ascending order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Changes needed to go from `self` to `newer`
    pub fn diff(&self, newer: &Snapshot) -> ChangeSet {
        diff(self, newer)
    }
}

impl FromIterator<(String, String)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Added / removed / modified paths between two snapshots, each sorted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} added, {} removed, {} modified",
            self.added.len(),
            self.removed.len(),
            self.modified.len()
        )
    }
}

/// Compare two snapshots.
///
/// Digests are compared as plain strings with no normalization. Output order
/// follows the snapshots' sorted keys, so each list is ascending.
pub fn diff(old: &Snapshot, new: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (path, digest) in &new.entries {
        match old.entries.get(path) {
            None => changes.added.push(path.clone()),
            Some(previous) if previous != digest => changes.modified.push(path.clone()),
            Some(_) => {}
        }
    }

    changes.removed = old
        .entries
        .keys()
        .filter(|path| !new.entries.contains_key(*path))
        .cloned()
        .collect();

    changes
}
