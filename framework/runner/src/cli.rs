use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(about, long_about = None)]
pub struct RegressCli {
    /// The control list to run, a `.yaml`, `.yml` or `.json` file
    pub control_file: PathBuf,

    /// Path to the generator program.
    ///
    /// Falls back to the `REGRESS_GENERATOR_PATH` environment variable, then the settings file,
    /// then looking for `friscv` on the `PATH`.
    #[arg(long)]
    pub generator: Option<PathBuf>,

    /// The flag the generator takes the test script with. Pass an empty string to give the script
    /// as a positional argument instead. Defaults to `-t`.
    #[arg(long)]
    pub test_flag: Option<String>,

    /// The maximum number of test cases to run at the same time. Defaults to 1.
    #[arg(long, short)]
    pub jobs: Option<usize>,

    /// Kill a test case that runs for longer than this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Directory that receives a sub-directory with the logs of each test case. Defaults to
    /// `output`.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// File to append the run summary to, as JSON lines. Defaults to `run_summary.jsonl`.
    #[arg(long, env = "RUN_SUMMARY_PATH")]
    pub run_summary: Option<PathBuf>,

    /// A TOML settings file providing defaults for these options
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Check that the `--cfg` file of every test case exists relative to this directory
    #[arg(long)]
    pub cfg_root: Option<PathBuf>,

    /// Print the generator command lines without running them
    #[arg(long, conflicts_with = "check")]
    pub dry_run: bool,

    /// Validate the control list without running anything
    #[arg(long)]
    pub check: bool,

    /// Hide the progress bar.
    ///
    /// The bar counts finished test cases. Turn it off when the output is captured to a file,
    /// for example on a CI server.
    #[arg(long)]
    pub no_progress: bool,

    /// Stop at the first test case that does not pass, cancelling the rest
    #[arg(long)]
    pub fail_fast: bool,

    /// Only run test cases whose `fname` contains this text. May be given more than once.
    #[arg(long)]
    pub filter: Vec<String>,
}
