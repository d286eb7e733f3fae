use std::path::PathBuf;
use std::time::Duration;

use regress_control::{DEFAULT_SCRIPT_SUFFIXES, DEFAULT_TEST_FLAG};

use crate::cli::RegressCli;
use crate::settings::Settings;
use crate::types::RegressResult;

pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_RUN_SUMMARY_PATH: &str = "run_summary.jsonl";

/// What the runner does with the resolved control list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run every test case.
    Execute,
    /// Print the command lines only.
    DryRun,
    /// Validate only.
    Check,
}

/// The builder for a run definition.
///
/// Combines the command line with an optional settings file. Values given on the command line win
/// over the settings file, which wins over the built-in defaults.
pub struct RunDefinitionBuilder {
    cli: RegressCli,
    settings: Settings,
}

/// Everything needed to run a control list.
#[derive(Debug, Clone)]
pub struct RunDefinition {
    pub control_file: PathBuf,
    /// The generator given on the command line. Beats everything else.
    pub generator: Option<PathBuf>,
    /// The generator from the settings file. Only used when `REGRESS_GENERATOR_PATH` is unset.
    pub configured_generator: Option<PathBuf>,
    pub test_flag: String,
    pub jobs: usize,
    pub timeout: Option<Duration>,
    pub output_dir: PathBuf,
    pub run_summary: PathBuf,
    pub cfg_root: Option<PathBuf>,
    pub script_suffixes: Vec<String>,
    pub filters: Vec<String>,
    pub mode: RunMode,
    pub fail_fast: bool,
    pub no_progress: bool,
}

impl RunDefinitionBuilder {
    pub fn new(cli: RegressCli) -> Self {
        Self {
            cli,
            settings: Settings::default(),
        }
    }

    /// Load the settings file named by `--config`, if any.
    pub fn load_settings(self) -> RegressResult<Self> {
        match &self.cli.config {
            Some(path) => {
                let settings = Settings::load(path)?;
                Ok(self.with_settings(settings))
            }
            None => Ok(self),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> RegressResult<RunDefinition> {
        let RegressCli {
            control_file,
            generator,
            test_flag,
            jobs,
            timeout,
            output_dir,
            run_summary,
            config: _,
            cfg_root,
            dry_run,
            check,
            no_progress,
            fail_fast,
            filter,
        } = self.cli;
        let settings = self.settings;

        let jobs = jobs.or(settings.jobs).unwrap_or(1);
        if jobs == 0 {
            anyhow::bail!("The number of jobs must be at least 1");
        }

        let mode = match (dry_run, check) {
            (true, true) => anyhow::bail!("--dry-run and --check cannot be used together"),
            (true, false) => RunMode::DryRun,
            (false, true) => RunMode::Check,
            (false, false) => RunMode::Execute,
        };

        Ok(RunDefinition {
            control_file,
            generator,
            configured_generator: settings.generator,
            test_flag: test_flag
                .or(settings.test_flag)
                .unwrap_or_else(|| DEFAULT_TEST_FLAG.to_string()),
            jobs,
            timeout: timeout.or(settings.timeout_s).map(Duration::from_secs),
            output_dir: output_dir
                .or(settings.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            run_summary: run_summary
                .or(settings.run_summary)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RUN_SUMMARY_PATH)),
            cfg_root: cfg_root.or(settings.cfg_root),
            script_suffixes: settings.script_suffixes.unwrap_or_else(|| {
                DEFAULT_SCRIPT_SUFFIXES
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
            filters: filter,
            mode,
            fail_fast,
            no_progress: no_progress || mode != RunMode::Execute,
        })
    }
}

impl RunDefinition {
    /// Whether a test case with this `fname` is selected by the `--filter` options.
    pub fn selects(&self, fname: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| fname.contains(f.as_str()))
    }
}
