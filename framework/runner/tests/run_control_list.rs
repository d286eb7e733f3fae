#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use pretty_assertions::assert_eq;
use regress_runner::prelude::*;
use regress_summary_model::load_summary_runs;
use tempfile::TempDir;

const CFG: &str = "{ --cfg: config/riscv.config, --noiss: ~ }";

fn write_script(dir: &Path, fname: &str, body: &str) {
    std::fs::write(dir.join(fname), format!("{body}\n")).unwrap();
}

fn write_control(dir: &Path, items: &[(&str, &str)]) -> PathBuf {
    let mut yaml = String::from("control_items:\n");
    for (fname, generator) in items {
        yaml.push_str(&format!("  - {{ fname: {fname}, generator: {generator} }}\n"));
    }
    let path = dir.join("list_fctrl.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

/// Runs scripts with `/bin/sh`, so each `*_force.py` holds shell code.
fn cli(dir: &TempDir, control_file: PathBuf) -> RegressCli {
    RegressCli {
        control_file,
        generator: Some(PathBuf::from("/bin/sh")),
        test_flag: Some(String::new()),
        output_dir: Some(dir.path().join("output")),
        run_summary: Some(dir.path().join("run_summary.jsonl")),
        no_progress: true,
        ..RegressCli::default()
    }
}

fn statuses(outcome: &RunOutcome) -> Vec<CaseStatus> {
    outcome.cases.iter().map(|case| case.status.clone()).collect()
}

#[test]
fn reports_each_case_in_list_order() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "a_force.py", "echo running $1 $2 $3");
    write_script(dir.path(), "b_force.py", "echo broken >&2\nexit 3");
    write_script(dir.path(), "c_force.py", "sleep 0.2");
    let control = write_control(
        dir.path(),
        &[("a_force.py", CFG), ("b_force.py", CFG), ("c_force.py", CFG)],
    );

    let outcome = run(RunDefinitionBuilder::new(RegressCli {
        jobs: Some(4),
        ..cli(&dir, control.clone())
    }))
    .unwrap();

    assert_eq!(
        statuses(&outcome),
        vec![
            CaseStatus::Passed,
            CaseStatus::Failed { exit_code: Some(3) },
            CaseStatus::Passed,
        ]
    );
    assert_eq!(
        outcome.cases.iter().map(|c| c.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert!(!outcome.all_passed());

    let case_dir = dir.path().join("output").join("0000_a_force");
    let log = std::fs::read_to_string(case_dir.join(LOG_FILE)).unwrap();
    assert_eq!(log, "running --cfg config/riscv.config --noiss\n");
    let command = std::fs::read_to_string(case_dir.join(COMMAND_FILE)).unwrap();
    assert!(command.starts_with("/bin/sh "));
    assert!(command.trim_end().ends_with("a_force.py --cfg config/riscv.config --noiss"));

    let failed_log =
        std::fs::read_to_string(dir.path().join("output/0001_b_force").join(LOG_FILE)).unwrap();
    assert_eq!(failed_log, "broken\n");

    let runs = load_summary_runs(dir.path().join("run_summary.jsonl")).unwrap();
    assert_eq!(runs.len(), 1);
    let summary = &runs[0];
    assert_eq!(summary.control_file, control.display().to_string());
    assert_eq!(summary.jobs, 4);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.passed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.cases[1].fname, "b_force.py");
    assert_eq!(Some(summary), outcome.summary.as_ref());
}

#[test]
fn all_passing_run_appends_to_existing_summary() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "ok_force.py", "exit 0");
    let control = write_control(dir.path(), &[("ok_force.py", CFG)]);

    for _ in 0..2 {
        let outcome = run(RunDefinitionBuilder::new(cli(&dir, control.clone()))).unwrap();
        assert!(outcome.all_passed());
    }

    let runs = load_summary_runs(dir.path().join("run_summary.jsonl")).unwrap();
    assert_eq!(runs.len(), 2);
    assert_ne!(runs[0].run_id, runs[1].run_id);
    assert_eq!(runs[0].fingerprint(), runs[1].fingerprint());
}

#[test]
fn slow_case_is_timed_out() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "slow_force.py", "exec sleep 30");
    write_script(dir.path(), "quick_force.py", "exit 0");
    let control = write_control(
        dir.path(),
        &[("slow_force.py", CFG), ("quick_force.py", CFG)],
    );

    let outcome = run(RunDefinitionBuilder::new(RegressCli {
        timeout: Some(1),
        jobs: Some(2),
        ..cli(&dir, control)
    }))
    .unwrap();

    assert_eq!(
        statuses(&outcome),
        vec![CaseStatus::TimedOut, CaseStatus::Passed]
    );
    assert!(outcome.cases[0].duration < Duration::from_secs(15));
    assert_eq!(outcome.summary.unwrap().timed_out, 1);
}

#[test]
fn fail_fast_cancels_remaining_cases() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "first_force.py", "exit 1");
    write_script(dir.path(), "second_force.py", "exit 0");
    write_script(dir.path(), "third_force.py", "exit 0");
    let control = write_control(
        dir.path(),
        &[
            ("first_force.py", CFG),
            ("second_force.py", CFG),
            ("third_force.py", CFG),
        ],
    );

    let outcome = run(RunDefinitionBuilder::new(RegressCli {
        jobs: Some(1),
        fail_fast: true,
        ..cli(&dir, control)
    }))
    .unwrap();

    assert_eq!(
        statuses(&outcome),
        vec![
            CaseStatus::Failed { exit_code: Some(1) },
            CaseStatus::Cancelled,
            CaseStatus::Cancelled,
        ]
    );
    assert_eq!(outcome.cases[1].log_path, None);
    assert!(!dir.path().join("output/0001_second_force").exists());
}

#[test]
fn fail_fast_cancels_running_cases() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "long_force.py", "exec sleep 30");
    write_script(dir.path(), "broken_force.py", "sleep 0.3\nexit 1");
    let control = write_control(
        dir.path(),
        &[("long_force.py", CFG), ("broken_force.py", CFG)],
    );

    let outcome = run(RunDefinitionBuilder::new(RegressCli {
        jobs: Some(2),
        fail_fast: true,
        ..cli(&dir, control)
    }))
    .unwrap();

    assert_eq!(
        statuses(&outcome),
        vec![
            CaseStatus::Cancelled,
            CaseStatus::Failed { exit_code: Some(1) },
        ]
    );
    assert!(outcome.cases[0].duration < Duration::from_secs(10));
    // It was started, so it has a log even though it was cut short.
    assert!(outcome.cases[0].log_path.is_some());
    assert_eq!(outcome.summary.unwrap().cancelled, 1);
}

#[test]
fn dry_run_prints_commands_without_running() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "touch_force.py", "touch ran");
    let control = write_control(dir.path(), &[("touch_force.py", CFG)]);

    let outcome = run(RunDefinitionBuilder::new(RegressCli {
        dry_run: true,
        ..cli(&dir, control)
    }))
    .unwrap();

    assert_eq!(outcome.mode, RunMode::DryRun);
    assert!(outcome.all_passed());
    assert!(outcome.cases.is_empty());
    assert_eq!(outcome.commands.len(), 1);
    assert!(outcome.commands[0].starts_with("/bin/sh "));
    assert!(outcome.commands[0].ends_with("touch_force.py --cfg config/riscv.config --noiss"));
    assert!(!dir.path().join("output").exists());
    assert!(!dir.path().join("run_summary.jsonl").exists());
}

#[test]
fn dry_run_uses_test_flag() {
    let dir = tempfile::tempdir().unwrap();
    let control = write_control(dir.path(), &[("State_force.py", CFG)]);

    let outcome = run(RunDefinitionBuilder::new(RegressCli {
        dry_run: true,
        test_flag: None,
        ..cli(&dir, control)
    }))
    .unwrap();

    let script = dir.path().join("State_force.py");
    assert_eq!(
        outcome.commands,
        vec![format!(
            "/bin/sh -t {} --cfg config/riscv.config --noiss",
            script.display()
        )]
    );
}

#[test]
fn check_reports_validation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let control = write_control(
        dir.path(),
        &[
            ("good_force.py", CFG),
            ("nocfg_force.py", "{ --noiss: ~ }"),
            ("good_force.py", CFG),
        ],
    );

    let outcome = run(RunDefinitionBuilder::new(RegressCli {
        check: true,
        ..cli(&dir, control)
    }))
    .unwrap();

    assert_eq!(outcome.mode, RunMode::Check);
    assert!(!outcome.all_passed());
    assert_eq!(outcome.validation.errors().count(), 1);
    assert_eq!(outcome.validation.warnings().count(), 1);
    assert!(!dir.path().join("output").exists());
}

#[test]
fn validation_errors_stop_execution() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "touch_force.py", "touch ran");
    let control = write_control(
        dir.path(),
        &[("touch_force.py", CFG), ("helper.sh", CFG)],
    );

    let result = run(RunDefinitionBuilder::new(cli(&dir, control)));

    assert!(result.is_err());
    assert!(!dir.path().join("output").exists());
}

#[test]
fn quoted_flag_values_reach_the_generator_unquoted() {
    let dir = tempfile::tempdir().unwrap();
    write_script(
        dir.path(),
        "api_getPageInfo_01_force.py",
        r#"[ "$1" = "--options" ] && [ "$2" = "PrivilegeLevel=1" ] || exit 9"#,
    );
    let control = write_control(
        dir.path(),
        &[(
            "api_getPageInfo_01_force.py",
            r#"{ --options: '"PrivilegeLevel=1"', --cfg: config/riscv.config }"#,
        )],
    );

    let outcome = run(RunDefinitionBuilder::new(cli(&dir, control))).unwrap();

    assert_eq!(statuses(&outcome), vec![CaseStatus::Passed]);
    assert!(outcome.cases[0]
        .command
        .contains(r#"--options "PrivilegeLevel=1" --cfg"#));
}

#[test]
fn filter_selects_matching_cases() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "Constraint_force.py", "exit 1");
    write_script(dir.path(), "State_force.py", "exit 0");
    let control = write_control(
        dir.path(),
        &[("Constraint_force.py", CFG), ("State_force.py", CFG)],
    );

    let outcome = run(RunDefinitionBuilder::new(RegressCli {
        filter: vec!["State".to_string()],
        ..cli(&dir, control)
    }))
    .unwrap();

    assert_eq!(outcome.cases.len(), 1);
    assert_eq!(outcome.cases[0].fname, "State_force.py");
    assert_eq!(outcome.cases[0].index, 1);
    assert!(outcome.all_passed());
}

#[test]
fn missing_generator_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let control = write_control(dir.path(), &[("State_force.py", CFG)]);

    let result = run(RunDefinitionBuilder::new(RegressCli {
        generator: Some(dir.path().join("no-such-generator")),
        ..cli(&dir, control)
    }));

    assert!(result.is_err());
}
