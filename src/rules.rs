//! Ignore rules (`.fimignore`)
//!
//! Patterns are loaded once per scan from a rules file inside the watched root
//! and compiled into an [`IgnoreMatcher`]. Two engines are available:
//!
//! - [`IgnoreEngine::Gitignore`]: full gitignore semantics via the `ignore`
//!   crate, including `!negation`. When several patterns match a path the last
//!   one in file order decides, as in git.
//! - [`IgnoreEngine::Glob`]: fnmatch-style patterns via `globset`. No negation,
//!   every pattern is a pure exclude and the first match wins. A leading `!`
//!   is just part of the pattern, and `{a,b}` matches literal braces.
//!
//! Gitignore is the canonical engine. Glob exists for compatibility with rule
//! files written for simple shell-style matching and makes no attempt to
//! emulate gitignore precedence.

use crate::error::{FimError, Result};
use globset::{GlobBuilder, GlobMatcher};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Default rules file name, looked up inside the watched root
pub const DEFAULT_IGNORE_FILE: &str = ".fimignore";

/// Predicate over root-relative, `/`-separated paths
pub trait IgnoreMatcher: Send + Sync {
    /// `rel` is relative to the watched root; the root itself is `""`
    fn is_ignored(&self, rel: &str, is_dir: bool) -> bool;

    fn engine(&self) -> IgnoreEngine;
}

/// Which pattern engine compiles the rule set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IgnoreEngine {
    #[default]
    Gitignore,
    Glob,
}

impl IgnoreEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreEngine::Gitignore => "gitignore",
            IgnoreEngine::Glob => "glob",
        }
    }

    /// Compile `rules` for matching paths under `root`
    pub fn compile(&self, root: &Path, rules: &RuleSet) -> Box<dyn IgnoreMatcher> {
        match self {
            IgnoreEngine::Gitignore => Box::new(GitignoreMatcher::new(root, rules)),
            IgnoreEngine::Glob => Box::new(GlobRuleMatcher::new(rules)),
        }
    }
}

impl fmt::Display for IgnoreEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IgnoreEngine {
    type Err = FimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gitignore" | "git" => Ok(IgnoreEngine::Gitignore),
            "glob" | "fnmatch" => Ok(IgnoreEngine::Glob),
            _ => Err(FimError::InvalidEngine(s.to_string())),
        }
    }
}

/// Ordered patterns read from a rules file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    pub patterns: Vec<String>,
}

impl RuleSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Load rules from `path`.
    ///
    /// A missing file gives an empty rule set, and so does a path that is not
    /// a regular file. Blank lines and lines starting with `#` are dropped; the
    /// rest are trimmed.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                tracing::warn!("Ignoring {}: not a regular file", path.display());
                return Ok(Self::default());
            }
            Err(_) => return Ok(Self::default()),
        }

        let bytes = fs::read(path).map_err(|source| FimError::Rules {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    pub fn parse(content: &str) -> Self {
        let patterns = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

/// Normalize `path` to the root-relative, `/`-separated form matchers expect.
///
/// The root itself (or anything outside it) becomes `""`.
pub fn relative_key(root: &Path, path: &Path) -> String {
    let rel = match path.strip_prefix(root) {
        Ok(rel) => rel,
        Err(_) => return String::new(),
    };

    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn basename(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}

/// Gitignore engine backed by the `ignore` crate
pub struct GitignoreMatcher {
    gitignore: Gitignore,
}

impl GitignoreMatcher {
    pub fn new(root: &Path, rules: &RuleSet) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in &rules.patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                tracing::warn!("Ignoring invalid rule '{}': {}", pattern, e);
            }
        }

        let gitignore = builder.build().unwrap_or_else(|e| {
            tracing::warn!("Failed to compile ignore rules: {}", e);
            Gitignore::empty()
        });

        Self { gitignore }
    }
}

impl IgnoreMatcher for GitignoreMatcher {
    fn is_ignored(&self, rel: &str, is_dir: bool) -> bool {
        if rel.is_empty() || self.gitignore.is_empty() {
            return false;
        }
        self.gitignore
            .matched_path_or_any_parents(Path::new(rel), is_dir)
            .is_ignore()
    }

    fn engine(&self) -> IgnoreEngine {
        IgnoreEngine::Gitignore
    }
}

/// A single compiled fnmatch-style pattern
enum Pattern {
    Glob(GlobMatcher),
    /// Pattern that is not a valid glob; compared verbatim
    Literal(String),
}

impl Pattern {
    fn compile(pattern: &str) -> Self {
        let built = GlobBuilder::new(&escape_braces(pattern))
            .literal_separator(false)
            .backslash_escape(false)
            .build();
        match built {
            Ok(glob) => Pattern::Glob(glob.compile_matcher()),
            Err(e) => {
                tracing::debug!("Treating rule '{}' literally: {}", pattern, e);
                Pattern::Literal(pattern.to_string())
            }
        }
    }

    fn is_match(&self, candidate: &str) -> bool {
        match self {
            Pattern::Glob(glob) => glob.is_match(candidate),
            Pattern::Literal(literal) => literal == candidate,
        }
    }
}

/// fnmatch has no `{a,b}` alternation, so braces outside a `[...]` class are
/// turned into single-character classes that match them literally.
fn escape_braces(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut in_class = false;
    let mut class_len = 0usize;
    for c in pattern.chars() {
        if in_class {
            // `]` right after `[` or `[!` is a member, not the closing bracket
            if c == ']' && class_len > 0 {
                in_class = false;
            } else if !(c == '!' && class_len == 0) {
                class_len += 1;
            }
            out.push(c);
            continue;
        }
        match c {
            '[' => {
                in_class = true;
                class_len = 0;
                out.push(c);
            }
            '{' => out.push_str("[{]"),
            '}' => out.push_str("[}]"),
            _ => out.push(c),
        }
    }
    out
}

struct GlobRule {
    pattern: Pattern,
    /// For `name/` rules: the directory name and its compiled pattern
    directory: Option<(String, Pattern)>,
}

/// Simplified engine: shell-style globs, first match wins, no negation
pub struct GlobRuleMatcher {
    rules: Vec<GlobRule>,
}

impl GlobRuleMatcher {
    pub fn new(rules: &RuleSet) -> Self {
        let rules = rules
            .patterns
            .iter()
            .map(|raw| {
                let directory = raw.strip_suffix('/').map(|base| {
                    (base.to_string(), Pattern::compile(base))
                });
                GlobRule {
                    pattern: Pattern::compile(raw),
                    directory,
                }
            })
            .collect();
        Self { rules }
    }
}

impl IgnoreMatcher for GlobRuleMatcher {
    fn is_ignored(&self, rel: &str, is_dir: bool) -> bool {
        if rel.is_empty() {
            return false;
        }

        for rule in &self.rules {
            if let Some((base, base_pattern)) = &rule.directory {
                let under = rel
                    .strip_prefix(base.as_str())
                    .is_some_and(|rest| rest.starts_with('/'));
                if under || (is_dir && base_pattern.is_match(rel)) {
                    return true;
                }
            }

            if rule.pattern.is_match(rel) || rule.pattern.is_match(basename(rel)) {
                return true;
            }
        }

        false
    }

    fn engine(&self) -> IgnoreEngine {
        IgnoreEngine::Glob
    }
}

/// Path of the rules file for a watched root
pub fn rules_path(root: &Path, file_name: &str) -> PathBuf {
    root.join(file_name)
}
