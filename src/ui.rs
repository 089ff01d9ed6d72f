// Terminal progress for downloads, drawn with `indicatif` on stderr.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] [{wide_bar}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg} {bytes} ({bytes_per_sec})";

/// Progress bar for a transfer of `total` bytes. A total of zero means the
/// server did not send a length, so a spinner is shown instead.
pub fn download_bar(total: u64) -> ProgressBar {
    let bar = if total > 0 {
        let bar = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar
    } else {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
            bar.set_style(style);
        }
        bar
    };
    bar.set_draw_target(ProgressDrawTarget::stderr());
    bar.set_message("Downloading");
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_length_follows_total() {
        assert_eq!(download_bar(2048).length(), Some(2048));
        assert_eq!(download_bar(0).length(), None);
    }
}
