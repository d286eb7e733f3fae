//! Runs the test cases of a generator control list and reports which ones passed.
//!
//! A run is described by a [prelude::RunDefinitionBuilder], usually built from the command line by
//! [prelude::init], and executed with [prelude::run].

mod case;
mod cli;
mod definition;
mod executor;
mod generator;
mod init;
mod progress;
mod report;
mod run;
mod settings;
mod shutdown;
mod types;

pub mod prelude {
    pub use crate::case::{PlannedCase, TestOutcome, COMMAND_FILE, LOG_FILE};
    pub use crate::cli::RegressCli;
    pub use crate::definition::{
        RunDefinition, RunDefinitionBuilder, RunMode, DEFAULT_OUTPUT_DIR, DEFAULT_RUN_SUMMARY_PATH,
    };
    pub use crate::generator::{generator_path, DEFAULT_GENERATOR, REGRESS_GENERATOR_PATH_ENV};
    pub use crate::init::init;
    pub use crate::run::{run, RunOutcome};
    pub use crate::settings::Settings;
    pub use crate::types::RegressResult;

    pub use regress_summary_model::CaseStatus;
}
