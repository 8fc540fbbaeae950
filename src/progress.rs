//! Progress bars for download runs.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Creates a bar for one service run.
///
/// When `hidden` is true the bar still counts but never draws, so callers
/// advance it unconditionally.
#[must_use]
pub fn service_bar(label: &str, total: u64, hidden: bool) -> ProgressBar {
    let bar = if hidden {
        ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden())
    } else {
        ProgressBar::new(total)
    };
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner} {msg} {pos}/{len} [{bar:30.magenta/blue}] {percent}% ({elapsed})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(label.to_string());
    bar
}
