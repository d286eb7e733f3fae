use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::Context;
use regress_control::{CommandLine, ResolvedItem};
use regress_core::prelude::DelegatedShutdownListener;
use regress_summary_model::CaseStatus;

/// The file in a test case's output directory that receives the generator's stdout and stderr.
pub const LOG_FILE: &str = "gen.log";
/// The file in a test case's output directory holding the command line that was run.
pub const COMMAND_FILE: &str = "cmd.txt";

/// A resolved control item together with the exact command that runs it.
#[derive(Debug, Clone)]
pub struct PlannedCase {
    pub resolved: ResolvedItem,
    pub command: CommandLine,
}

impl PlannedCase {
    pub fn index(&self) -> usize {
        self.resolved.index
    }

    pub fn fname(&self) -> &str {
        &self.resolved.item.fname
    }

    /// `<output_dir>/<index>_<script stem>`, so that repeated `fname`s get separate directories.
    pub fn output_dir(&self, output_dir: &Path) -> PathBuf {
        let stem = self
            .resolved
            .script
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "case".to_string());
        output_dir.join(format!("{:04}_{stem}", self.index()))
    }
}

/// The result of running one test case.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub index: usize,
    pub fname: String,
    pub command: String,
    pub status: CaseStatus,
    pub duration: Duration,
    pub log_path: Option<PathBuf>,
}

impl TestOutcome {
    /// An outcome for a case that was never started.
    pub(crate) fn cancelled(case: &PlannedCase) -> Self {
        Self {
            index: case.index(),
            fname: case.fname().to_string(),
            command: case.command.to_string(),
            status: CaseStatus::Cancelled,
            duration: Duration::ZERO,
            log_path: None,
        }
    }
}

enum Finish {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Run a single test case to completion, timeout or cancellation.
pub(crate) async fn run_case(
    case: &PlannedCase,
    output_dir: &Path,
    timeout: Option<Duration>,
    mut shutdown_listener: DelegatedShutdownListener,
) -> TestOutcome {
    let started = Instant::now();
    let case_dir = case.output_dir(output_dir);
    let log_path = case_dir.join(LOG_FILE);

    let status = match execute(case, &case_dir, &log_path, timeout, &mut shutdown_listener).await
    {
        Ok(status) => status,
        Err(e) => {
            log::error!("Failed to run {}: {e:?}", case.fname());
            CaseStatus::SpawnError {
                message: format!("{e:#}"),
            }
        }
    };

    TestOutcome {
        index: case.index(),
        fname: case.fname().to_string(),
        command: case.command.to_string(),
        status,
        duration: started.elapsed(),
        log_path: Some(log_path),
    }
}

async fn execute(
    case: &PlannedCase,
    case_dir: &Path,
    log_path: &Path,
    timeout: Option<Duration>,
    shutdown_listener: &mut DelegatedShutdownListener,
) -> anyhow::Result<CaseStatus> {
    tokio::fs::create_dir_all(case_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", case_dir.display()))?;
    tokio::fs::write(case_dir.join(COMMAND_FILE), format!("{}\n", case.command))
        .await
        .context("Failed to record command line")?;

    let log = std::fs::File::create(log_path)
        .with_context(|| format!("Failed to create log file {}", log_path.display()))?;
    let log_err = log.try_clone().context("Failed to share log file")?;

    log::debug!("Running #{} {}", case.index(), case.command);
    let mut child = tokio::process::Command::new(&case.command.program)
        .args(case.command.exec_args())
        .current_dir(case_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start '{}'", case.command.program))?;

    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    };

    let finish = tokio::select! {
        status = child.wait() => Finish::Exited(status),
        _ = deadline => Finish::TimedOut,
        _ = shutdown_listener.wait_for_shutdown() => Finish::Cancelled,
    };

    match finish {
        Finish::Exited(status) => {
            let status = status.context("Failed to wait for generator")?;
            Ok(if status.success() {
                CaseStatus::Passed
            } else {
                CaseStatus::Failed {
                    exit_code: status.code(),
                }
            })
        }
        Finish::TimedOut => {
            log::warn!("{} timed out, killing generator", case.fname());
            child.kill().await.context("Failed to kill timed out generator")?;
            Ok(CaseStatus::TimedOut)
        }
        Finish::Cancelled => {
            child.kill().await.context("Failed to kill cancelled generator")?;
            Ok(CaseStatus::Cancelled)
        }
    }
}
