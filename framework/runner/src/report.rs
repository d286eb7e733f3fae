mod outcome_table;

use regress_summary_model::CaseStatus;
use tabled::settings::Style;
use tabled::Table;

use crate::case::TestOutcome;
use crate::report::outcome_table::OutcomeRow;

pub(crate) fn outcome_rows(outcomes: &[TestOutcome]) -> Vec<OutcomeRow> {
    outcomes
        .iter()
        .map(|outcome| OutcomeRow {
            index: outcome.index,
            fname: outcome.fname.clone(),
            status: outcome.status.to_string(),
            duration_s: outcome.duration.as_secs_f64(),
            log: outcome
                .log_path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
        })
        .collect()
}

/// Print a table of test case outcomes followed by the totals.
pub(crate) fn print_outcomes(outcomes: &[TestOutcome]) {
    println!("\nSummary of test cases");

    let mut table = Table::new(outcome_rows(outcomes));
    table.with(Style::modern());
    println!("{}", table);

    println!("{}", totals_line(outcomes));
}

fn totals_line(outcomes: &[TestOutcome]) -> String {
    let count = |pred: fn(&CaseStatus) -> bool| outcomes.iter().filter(|o| pred(&o.status)).count();

    format!(
        "{} test cases: {} passed, {} failed, {} timed out, {} cancelled",
        outcomes.len(),
        count(|s| matches!(s, CaseStatus::Passed)),
        count(|s| matches!(s, CaseStatus::Failed { .. } | CaseStatus::SpawnError { .. })),
        count(|s| matches!(s, CaseStatus::TimedOut)),
        count(|s| matches!(s, CaseStatus::Cancelled)),
    )
}
