use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;

/// How a single test case ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    /// The generator exited unsuccessfully. The exit code is missing if it was killed by a signal.
    Failed { exit_code: Option<i32> },
    TimedOut,
    /// Stopped, or never started, because the run was shut down.
    Cancelled,
    /// The generator could not be started at all.
    SpawnError { message: String },
}

impl CaseStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, CaseStatus::Passed)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Passed => f.write_str("passed"),
            CaseStatus::Failed {
                exit_code: Some(code),
            } => write!(f, "failed ({code})"),
            CaseStatus::Failed { exit_code: None } => f.write_str("failed (signal)"),
            CaseStatus::TimedOut => f.write_str("timed out"),
            CaseStatus::Cancelled => f.write_str("cancelled"),
            CaseStatus::SpawnError { message } => write!(f, "spawn error: {message}"),
        }
    }
}

/// Summary of one test case within a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaseSummary {
    pub fname: String,
    /// The full generator command line, as it would be typed into a shell
    pub command: String,
    pub status: CaseStatus,
    pub duration_ms: u64,
}

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The control file that was run
    pub control_file: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// Path of the generator program
    pub generator: String,
    /// The maximum number of test cases run at the same time
    pub jobs: usize,
    /// Per test case time limit, in seconds
    pub timeout_s: Option<u64>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: usize,
    /// The test cases in control list order
    pub cases: Vec<CaseSummary>,
    /// Environment variables set for the run
    ///
    /// This won't capture all environment variables. Just the ones that the runner is aware of.
    pub env: HashMap<String, String>,
    /// The version of the runner used for this run
    pub regress_version: String,
}

impl RunSummary {
    /// Create a new run summary
    ///
    /// The counters are derived from `cases`. Spawn errors count as failures.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: String,
        control_file: String,
        started_at: i64,
        generator: String,
        jobs: usize,
        timeout_s: Option<u64>,
        cases: Vec<CaseSummary>,
        regress_version: String,
    ) -> Self {
        let count =
            |pred: fn(&CaseStatus) -> bool| cases.iter().filter(|c| pred(&c.status)).count();
        let passed = count(|s| matches!(s, CaseStatus::Passed));
        let failed = count(|s| {
            matches!(s, CaseStatus::Failed { .. } | CaseStatus::SpawnError { .. })
        });
        let timed_out = count(|s| matches!(s, CaseStatus::TimedOut));
        let cancelled = count(|s| matches!(s, CaseStatus::Cancelled));

        Self {
            run_id,
            control_file,
            started_at,
            generator,
            jobs,
            timeout_s,
            total: cases.len(),
            passed,
            failed,
            timed_out,
            cancelled,
            cases,
            env: HashMap::with_capacity(0),
            regress_version,
        }
    }

    /// Add an environment variable
    pub fn add_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint identifies the configuration used for the run, so that runs of the same
    /// control list with the same flags can be compared. It uses the
    ///     - Control file
    ///     - Command line of each case, in order
    ///     - Selected environment variables
    ///     - Runner version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.control_file.as_bytes());
        for case in &self.cases {
            Digest::update(&mut hasher, case.command.as_bytes());
        }
        self.env
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        Digest::update(&mut hasher, self.regress_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: PathBuf) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary]. Blank lines are skipped.
pub fn load_summary_runs(path: PathBuf) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn case(fname: &str, status: CaseStatus) -> CaseSummary {
        CaseSummary {
            fname: fname.to_string(),
            command: format!("friscv -t {fname} --cfg config/riscv.config --noiss"),
            status,
            duration_ms: 10,
        }
    }

    fn sample() -> RunSummary {
        RunSummary::new(
            "abc".to_string(),
            "control/riscv/APIs/_noiss_fctrl.yaml".to_string(),
            1_700_000_000,
            "/usr/bin/friscv".to_string(),
            2,
            Some(60),
            vec![
                case("State_force.py", CaseStatus::Passed),
                case("Constraint_force.py", CaseStatus::Failed { exit_code: Some(1) }),
                case(
                    "LoadImmediate_force.py",
                    CaseStatus::SpawnError {
                        message: "not found".to_string(),
                    },
                ),
                case("WriteRegisterTest_force.py", CaseStatus::TimedOut),
                case("InitializeRegisterTest_force.py", CaseStatus::Cancelled),
            ],
            "0.1.0".to_string(),
        )
    }

    #[test]
    fn counts_are_derived_from_cases() {
        let summary = sample();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.cancelled, 1);
        assert!(!summary.all_passed());
    }

    #[test]
    fn fingerprint_ignores_run_identity_but_not_commands() {
        let first = sample();
        let mut second = sample();
        second.run_id = "other".to_string();
        second.started_at += 100;
        assert_eq!(first.fingerprint(), second.fingerprint());

        second.cases[0].command.push_str(" --max-instr 10");
        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn fingerprint_is_independent_of_env_insertion_order() {
        let mut first = sample();
        first.add_env("A".to_string(), "1".to_string());
        first.add_env("B".to_string(), "2".to_string());
        let mut second = sample();
        second.add_env("B".to_string(), "2".to_string());
        second.add_env("A".to_string(), "1".to_string());
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn appended_summaries_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_summary.jsonl");

        let summary = sample();
        append_run_summary(&summary, path.clone()).unwrap();
        append_run_summary(&summary, path.clone()).unwrap();

        let runs = load_summary_runs(path).unwrap();
        assert_eq!(runs, vec![summary.clone(), summary]);
    }

    #[test]
    fn status_serializes_with_kind_tag() {
        let json = serde_json::to_string(&CaseStatus::Failed { exit_code: Some(3) }).unwrap();
        assert_eq!(json, r#"{"kind":"failed","exit_code":3}"#);
    }
}
