use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const TEMPLATE: &str =
    "{percent:>3}% [{bar:40}] {binary_bytes_per_sec} {bytes}/{total_bytes} {elapsed_precise} ETA {eta}";

/// Upload progress bar on stderr, started lazily on the first update.
pub struct UploadProgress {
    bar: ProgressBar,
}

impl UploadProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        Self { bar }
    }

    pub fn update(&self, total: u64, uploaded: u64) {
        if self.bar.length() != Some(total) {
            self.bar.set_length(total);
        }
        self.bar.set_position(uploaded);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for UploadProgress {
    fn default() -> Self {
        Self::new()
    }
}
