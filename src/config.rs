//! Configuration file support (`fim.toml`)
//!
//! Every setting has a default, the file only needs the keys it overrides, and
//! command-line flags win over both.

use crate::digest::HashAlgorithm;
use crate::error::{FimError, Result};
use crate::rules::{IgnoreEngine, DEFAULT_IGNORE_FILE};
use crate::store::DEFAULT_STATE_FILE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "fim.toml";

/// Default log file, relative to the working directory
pub const DEFAULT_LOG_FILE: &str = "monitor.log";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorSection,
    pub files: FilesSection,
    pub rules: RulesSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub interval_secs: u64,
    pub algorithm: String,
    pub parallel: bool,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            algorithm: HashAlgorithm::default().to_string(),
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesSection {
    pub state_file: PathBuf,
    pub log_file: PathBuf,
    pub ignore_file: String,
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            ignore_file: DEFAULT_IGNORE_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesSection {
    pub engine: String,
}

impl Default for RulesSection {
    fn default() -> Self {
        Self {
            engine: IgnoreEngine::default().to_string(),
        }
    }
}

/// Values given on the command line; `None` keeps the file/default value
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub interval_secs: Option<u64>,
    pub algorithm: Option<String>,
    pub parallel: Option<bool>,
    pub state_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub engine: Option<String>,
}

impl Config {
    /// Load from an explicit path (must exist), or from `fim.toml` in the
    /// working directory if present, otherwise defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| FimError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| FimError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate().map_err(|e| FimError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(config)
    }

    pub fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(interval) = overrides.interval_secs {
            self.monitor.interval_secs = interval;
        }
        if let Some(algorithm) = overrides.algorithm {
            self.monitor.algorithm = algorithm;
        }
        if let Some(parallel) = overrides.parallel {
            self.monitor.parallel = parallel;
        }
        if let Some(state_file) = overrides.state_file {
            self.files.state_file = state_file;
        }
        if let Some(log_file) = overrides.log_file {
            self.files.log_file = log_file;
        }
        if let Some(engine) = overrides.engine {
            self.rules.engine = engine;
        }
    }

    /// Check names that are only parsed later
    pub fn validate(&self) -> Result<()> {
        if self.monitor.interval_secs == 0 {
            return Err(FimError::InvalidInterval(0));
        }
        self.algorithm()?;
        self.engine()?;
        Ok(())
    }

    pub fn algorithm(&self) -> Result<HashAlgorithm> {
        self.monitor.algorithm.parse()
    }

    pub fn engine(&self) -> Result<IgnoreEngine> {
        self.rules.engine.parse()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.monitor.interval_secs)
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
