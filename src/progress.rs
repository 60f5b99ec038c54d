use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner for indeterminate progress (baseline scans)
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Spinner only when output is meant for a human
pub fn maybe_spinner(enabled: bool, msg: &str) -> Option<ProgressBar> {
    enabled.then(|| create_spinner(msg))
}

/// Finish and clear progress bar
pub fn finish_and_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}
