//! Progress indicators for submission.
//!
//! Wraps `indicatif` with the crate's styling. Bars are hidden when the
//! `TEAZER_NO_PROGRESS` environment variable is set (any value) or when the
//! caller asks for a hidden bar (`--no-progress`, `--dryrun`).

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};

/// Environment variable that disables all progress output.
pub const NO_PROGRESS_ENV: &str = "TEAZER_NO_PROGRESS";

fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV).is_ok()
}

/// A progress bar over a known number of ensembles.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Create a bar of length `len`, hidden if progress is disabled.
    #[must_use]
    pub fn new(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(default_style());
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// A bar that never draws.
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    /// Create a visible bar unless `enabled` is false or the environment
    /// disables progress.
    #[must_use]
    pub fn for_run(len: u64, enabled: bool) -> Self {
        if enabled {
            Self::new(len)
        } else {
            Self::hidden()
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    /// Print a line above the bar without corrupting it.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.inner.is_hidden() {
            println!("{}", msg.as_ref());
        } else {
            self.inner.println(msg.as_ref());
        }
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }

    /// Position for tests and summaries.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.inner.position()
    }
}

fn default_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
        .progress_chars("━╸━")
}
