use indicatif::{ProgressBar, ProgressStyle};

/// Displays a progress bar counting finished test cases.
pub(crate) fn start_progress(total: usize) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} [{elapsed_precise}] {msg}",
        )?
        .progress_chars("#>-"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(200));

    Ok(pb)
}
