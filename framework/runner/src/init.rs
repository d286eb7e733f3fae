use clap::Parser;

use crate::cli::RegressCli;

/// Initialise the CLI and logging for the runner.
pub fn init() -> RegressCli {
    env_logger::init();

    RegressCli::parse()
}
