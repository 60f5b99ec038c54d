use anyhow::Context;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::config::{CliOverrides, Config};
use crate::error::FimError;
use crate::logging;
use crate::monitor::Monitor;
use crate::progress;
use crate::report::{ConsoleSink, JsonSink, OutputMode, ReportSink};
use crate::scanner::ScanOptions;
use crate::signal::{self, CancellationToken};
use crate::store::SnapshotStore;
use crate::utils;

#[derive(Parser)]
#[command(name = "fim")]
#[command(version)]
#[command(about = "Watch a directory tree and report added, removed and modified files")]
#[command(long_about = "fim hashes every file under a directory, stores the result as a \
    baseline, and on each poll reports files that were added, removed or modified since \
    the previous scan.\n\n\
    Paths listed in <DIRECTORY>/.fimignore are skipped (gitignore syntax by default).\n\n\
    Examples:\n  \
    fim /srv/www --init                 # Record a baseline and exit\n  \
    fim /srv/www -i 5 --hash sha512     # Poll every 5 seconds\n  \
    fim /srv/www --engine glob --json   # Shell-style ignore rules, JSON output")]
pub struct Cli {
    /// Directory to monitor
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Seconds between scans [default: 10]
    #[arg(short = 'i', long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Hash algorithm: md5, sha1, sha224..sha512, sha512_224, sha512_256, sha3_224..sha3_512, blake2b, blake2s, blake3 [default: sha256]
    #[arg(long = "hash", value_name = "ALGORITHM")]
    pub hash: Option<String>,

    /// Initialize baseline and exit
    #[arg(long)]
    pub init: bool,

    /// Ignore rule engine: gitignore or glob [default: gitignore]
    #[arg(long, value_name = "ENGINE")]
    pub engine: Option<String>,

    /// Baseline file [default: file_hashes.json]
    #[arg(long, value_name = "PATH")]
    pub state_file: Option<PathBuf>,

    /// Log file [default: monitor.log]
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Configuration file [default: ./fim.toml if present]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Hash files on all CPU cores
    #[arg(long)]
    pub parallel: bool,

    /// Print change reports as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Stop after N scan cycles
    #[arg(long, value_name = "N")]
    pub cycles: Option<u64>,

    /// Increase output verbosity (-v, -vv for more)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    fn output_mode(&self) -> OutputMode {
        if self.quiet {
            OutputMode::Quiet
        } else if self.verbose >= 1 {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }

    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            interval_secs: self.interval,
            algorithm: self.hash.clone(),
            parallel: self.parallel.then_some(true),
            state_file: self.state_file.clone(),
            log_file: self.log_file.clone(),
            engine: self.engine.clone(),
        }
    }

    fn use_color(&self) -> bool {
        !self.no_color && std::env::var_os("NO_COLOR").is_none()
    }

    pub fn run(self) -> anyhow::Result<()> {
        let output_mode = self.output_mode();

        let mut config = Config::load(self.config.as_deref())?;
        config.apply_cli_overrides(self.overrides());
        let algorithm = config.algorithm()?;
        let engine = config.engine()?;

        if !self.directory.is_dir() {
            return Err(FimError::InvalidRoot(self.directory.clone()).into());
        }

        logging::init(&config.files.log_file, self.verbose)?;

        let cancel = CancellationToken::new();
        let options = ScanOptions {
            algorithm,
            engine,
            ignore_file: config.files.ignore_file.clone(),
            parallel: config.monitor.parallel,
            cancel: Some(cancel.clone()),
        };
        let store = SnapshotStore::new(&config.files.state_file);

        let interactive = output_mode != OutputMode::Quiet && !self.json;
        if self.init && interactive {
            println!(
                "[*] Initializing baseline for {} using {}...",
                utils::display_path(&self.directory),
                algorithm.as_str().to_uppercase()
            );
        }
        let spinner = progress::maybe_spinner(self.init && interactive, "Hashing files...");

        let mut sink: Box<dyn ReportSink> = if self.json {
            Box::new(JsonSink::stdout(output_mode == OutputMode::Verbose))
        } else {
            Box::new(
                ConsoleSink::new(output_mode, self.use_color()).with_progress(spinner.clone()),
            )
        };

        let mut monitor = Monitor::new(&self.directory, options, store, sink.as_mut())
            .with_interval(config.interval())
            .with_max_cycles(self.cycles);

        if self.init {
            let result = monitor.initialize_baseline();
            // Still spinning if the scan failed before the sink printed
            if let Some(sp) = spinner {
                progress::finish_and_clear(&sp);
            }
            result.context("Failed to initialize baseline")?;
            return Ok(());
        }

        if let Err(e) = signal::cancel_on_ctrl_c(cancel) {
            tracing::warn!("Ctrl+C handler unavailable: {}", e);
        }

        monitor.run().context("Monitoring stopped")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_monitor_args() {
        let cli = Cli::try_parse_from(["fim", "/srv/www", "-i", "5", "--hash", "sha512"]).unwrap();
        assert_eq!(cli.directory, PathBuf::from("/srv/www"));
        assert_eq!(cli.interval, Some(5));
        assert_eq!(cli.hash.as_deref(), Some("sha512"));
        assert!(!cli.init);
        assert_eq!(cli.output_mode(), OutputMode::Normal);
    }

    #[test]
    fn test_parse_init_quiet() {
        let cli = Cli::try_parse_from(["fim", ".", "--init", "-q"]).unwrap();
        assert!(cli.init);
        assert_eq!(cli.output_mode(), OutputMode::Quiet);
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(Cli::try_parse_from(["fim", ".", "-i", "0"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["fim", ".", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_overrides_only_set_given_flags() {
        let cli = Cli::try_parse_from(["fim", ".", "--engine", "glob"]).unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.engine.as_deref(), Some("glob"));
        assert!(overrides.interval_secs.is_none());
        assert!(overrides.parallel.is_none());
        assert!(overrides.algorithm.is_none());
    }

    #[test]
    fn test_invalid_directory_is_rejected_before_scanning() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        let log_file = temp_dir.path().join("monitor.log");
        let cli = Cli::try_parse_from([
            "fim".to_string(),
            missing.display().to_string(),
            "--log-file".to_string(),
            log_file.display().to_string(),
        ])
        .unwrap();

        let err = cli.run().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FimError>(),
            Some(FimError::InvalidRoot(_))
        ));
        assert!(!log_file.exists());
    }

    #[test]
    fn test_invalid_hash_is_rejected() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cli = Cli::try_parse_from([
            "fim".to_string(),
            temp_dir.path().display().to_string(),
            "--hash".to_string(),
            "notahash".to_string(),
        ])
        .unwrap();

        let err = cli.run().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FimError>(),
            Some(FimError::InvalidAlgorithm(_))
        ));
    }
}
