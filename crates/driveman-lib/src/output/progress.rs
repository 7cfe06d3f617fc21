use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const BYTES_TEMPLATE: &str =
    "{spinner:.green} {msg:30!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

fn bytes_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(BYTES_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
}

/// Byte progress for a download. The length is filled in once the response
/// headers arrive, so `total` may start at 0.
pub fn create_download_progress(name: &str, total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(bytes_style());
    pb.set_message(name.to_string());
    pb
}

/// One bar per file of a multi-file upload, stacked under `multi`.
pub fn create_upload_progress(multi: &MultiProgress, name: &str, total: u64) -> ProgressBar {
    let pb = multi.add(ProgressBar::new(total));
    pb.set_style(bytes_style());
    pb.set_message(name.to_string());
    pb
}

/// Create a spinner for indeterminate operations.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
