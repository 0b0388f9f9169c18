use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Shown while an install or download is running.
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[33m{spinner}\x1b[0m {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"])
}

/// Final line for an installed, upgraded or already current server.
pub fn ok_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[32m✔\x1b[0m {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Final line when the install failed; the error itself follows on stderr.
pub fn err_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[31m✘\x1b[0m {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// A ticking spinner showing `msg`. Hidden when stderr is not a terminal.
pub fn spinner(msg: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.enable_steady_tick(Duration::from_millis(200));
    pb.set_message(msg.into());
    pb
}

pub fn finish_ok(pb: &ProgressBar, msg: impl Into<String>) {
    pb.set_style(ok_style());
    pb.finish_with_message(msg.into());
}

pub fn finish_err(pb: &ProgressBar, msg: impl Into<String>) {
    pb.set_style(err_style());
    pb.finish_with_message(msg.into());
}
