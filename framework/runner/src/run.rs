use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use indicatif::ProgressBar;
use regress_control::{
    validate, ControlFile, GeneratorInvocation, ResolveOptions, ValidationOptions,
    ValidationReport,
};
use regress_core::prelude::ShutdownHandle;
use regress_summary_model::{append_run_summary, CaseSummary, RunSummary};
use tokio::sync::Semaphore;

use crate::case::{run_case, PlannedCase, TestOutcome};
use crate::definition::{RunDefinition, RunDefinitionBuilder, RunMode};
use crate::executor::Executor;
use crate::generator::{generator_path, DEFAULT_GENERATOR, REGRESS_GENERATOR_PATH_ENV};
use crate::progress::start_progress;
use crate::report::print_outcomes;
use crate::shutdown::start_shutdown_listener;

/// What a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub mode: RunMode,
    pub validation: ValidationReport,
    /// One entry per test case in control list order. Empty unless the cases were executed.
    pub cases: Vec<TestOutcome>,
    /// The command lines that were, or in a dry run would have been, run.
    pub commands: Vec<String>,
    pub summary: Option<RunSummary>,
}

impl RunOutcome {
    /// Whether the run should be reported as a success.
    pub fn all_passed(&self) -> bool {
        match self.mode {
            RunMode::Check => self.validation.is_ok(),
            RunMode::DryRun => true,
            RunMode::Execute => self.cases.iter().all(|case| case.status.is_passed()),
        }
    }
}

struct CaseSettings {
    output_dir: PathBuf,
    timeout: Option<Duration>,
    fail_fast: bool,
}

pub fn run(definition: RunDefinitionBuilder) -> anyhow::Result<RunOutcome> {
    let definition = definition.build()?;

    log::info!("Running control file: {}", definition.control_file.display());

    let control = ControlFile::load(&definition.control_file).with_context(|| {
        format!(
            "Failed to load control file {}",
            definition.control_file.display()
        )
    })?;
    let items = control
        .resolve(&ResolveOptions::default())
        .context("Failed to resolve control file")?
        .into_iter()
        .filter(|resolved| definition.selects(&resolved.item.fname))
        .collect::<Vec<_>>();

    let validation = validate(
        &items,
        &ValidationOptions {
            script_suffixes: definition.script_suffixes.clone(),
            cfg_root: definition.cfg_root.clone(),
        },
    );
    for warning in validation.warnings() {
        log::warn!("{warning}");
    }
    for error in validation.errors() {
        log::error!("{error}");
    }

    if definition.mode == RunMode::Check {
        log::info!(
            "Checked {} test cases, {} errors",
            items.len(),
            validation.errors().count()
        );
        return Ok(RunOutcome {
            mode: RunMode::Check,
            validation,
            cases: Vec::new(),
            commands: Vec::new(),
            summary: None,
        });
    }

    if !validation.is_ok() {
        anyhow::bail!(
            "{} validation errors in {}, not running",
            validation.errors().count(),
            definition.control_file.display()
        );
    }

    let found = generator_path(
        definition.generator.as_deref(),
        definition.configured_generator.as_deref(),
    );
    let generator = match (found, definition.mode) {
        (Ok(path), _) => path,
        (Err(e), RunMode::DryRun) => {
            log::debug!("Generator not found for dry run: {e:#}");
            definition
                .generator
                .clone()
                .or_else(|| definition.configured_generator.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_GENERATOR))
        }
        (Err(e), _) => return Err(e),
    };
    let invocation = GeneratorInvocation::new(generator).with_test_flag(&definition.test_flag);

    // Test cases run inside their own output directory, so scripts need an absolute path.
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let cases = items
        .into_iter()
        .map(|resolved| {
            let script = cwd.join(&resolved.script);
            PlannedCase {
                command: invocation.command_for(&script, &resolved.item),
                resolved,
            }
        })
        .collect::<Vec<_>>();
    let commands = cases
        .iter()
        .map(|case| case.command.to_string())
        .collect::<Vec<_>>();

    if definition.mode == RunMode::DryRun {
        for command in &commands {
            println!("{command}");
        }
        return Ok(RunOutcome {
            mode: RunMode::DryRun,
            validation,
            cases: Vec::new(),
            commands,
            summary: None,
        });
    }

    let started_at = chrono::Utc::now().timestamp();
    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);
    let executor = Executor::new(runtime, shutdown_handle);

    let progress = if definition.no_progress {
        None
    } else {
        Some(start_progress(cases.len())?)
    };

    let settings = Arc::new(CaseSettings {
        output_dir: definition.output_dir.clone(),
        timeout: definition.timeout,
        fail_fast: definition.fail_fast,
    });
    let outcomes = executor.block_on(run_cases(
        cases,
        definition.jobs,
        settings,
        executor.shutdown_handle().clone(),
        progress.clone(),
    ));

    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    print_outcomes(&outcomes);

    let summary = run_summary(&definition, &invocation, started_at, &outcomes);
    log::info!(
        "{} passed, {} failed, {} timed out, {} cancelled",
        summary.passed,
        summary.failed,
        summary.timed_out,
        summary.cancelled
    );
    if let Err(e) = append_run_summary(&summary, definition.run_summary.clone()) {
        // The results were already printed, a missing summary shouldn't fail the run.
        log::error!(
            "Failed to write run summary to {}: {e:?}",
            definition.run_summary.display()
        );
    }

    Ok(RunOutcome {
        mode: RunMode::Execute,
        validation,
        cases: outcomes,
        commands,
        summary: Some(summary),
    })
}

/// Run the cases with at most `jobs` at once, returning outcomes in control list order.
///
/// Cases are started in list order. Once the run is shut down, cases that haven't started are
/// cancelled without being run.
async fn run_cases(
    cases: Vec<PlannedCase>,
    jobs: usize,
    settings: Arc<CaseSettings>,
    shutdown_handle: ShutdownHandle,
    progress: Option<ProgressBar>,
) -> Vec<TestOutcome> {
    let semaphore = Arc::new(Semaphore::new(jobs));
    let mut queue_listener = shutdown_handle.new_listener();

    let mut pending = Vec::with_capacity(cases.len());
    for case in cases {
        let fallback = TestOutcome::cancelled(&case);

        let acquired = queue_listener
            .cancellable(semaphore.clone().acquire_owned())
            .await;
        let permit = match acquired {
            Ok(Ok(permit)) if !queue_listener.should_shutdown() => permit,
            not_started => {
                if let Ok(Err(e)) = not_started {
                    log::error!("Failed to schedule {}: {e}", fallback.fname);
                }
                if let Some(progress) = &progress {
                    progress.inc(1);
                }
                pending.push((fallback, None));
                continue;
            }
        };

        let settings = settings.clone();
        let shutdown_handle = shutdown_handle.clone();
        let case_listener = shutdown_handle.new_listener();
        let progress = progress.clone();

        let handle = tokio::spawn(async move {
            let outcome =
                run_case(&case, &settings.output_dir, settings.timeout, case_listener).await;
            if settings.fail_fast && !outcome.status.is_passed() {
                log::warn!("{} did not pass, stopping the run", outcome.fname);
                shutdown_handle.shutdown();
            }
            drop(permit);

            if let Some(progress) = progress {
                progress.set_message(outcome.fname.clone());
                progress.inc(1);
            }

            outcome
        });

        pending.push((fallback, Some(handle)));
    }

    let mut outcomes = Vec::with_capacity(pending.len());
    for (fallback, handle) in pending {
        let Some(handle) = handle else {
            outcomes.push(fallback);
            continue;
        };
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                log::error!("Test case task for {} failed: {e:?}", fallback.fname);
                outcomes.push(fallback);
            }
        }
    }

    outcomes
}

fn run_summary(
    definition: &RunDefinition,
    invocation: &GeneratorInvocation,
    started_at: i64,
    outcomes: &[TestOutcome],
) -> RunSummary {
    let cases = outcomes
        .iter()
        .map(|outcome| CaseSummary {
            fname: outcome.fname.clone(),
            command: outcome.command.clone(),
            status: outcome.status.clone(),
            duration_ms: outcome.duration.as_millis() as u64,
        })
        .collect();

    let mut summary = RunSummary::new(
        nanoid::nanoid!(),
        definition.control_file.display().to_string(),
        started_at,
        invocation.program.display().to_string(),
        definition.jobs,
        definition.timeout.map(|timeout| timeout.as_secs()),
        cases,
        env!("CARGO_PKG_VERSION").to_string(),
    );

    if let Ok(value) = std::env::var(REGRESS_GENERATOR_PATH_ENV) {
        summary.add_env(REGRESS_GENERATOR_PATH_ENV.to_string(), value);
    }

    summary
}
