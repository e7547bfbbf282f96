use std::sync::Arc;

use dbtest_core::{StatusListener, TestCase};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Drives a progress bar from status events during a set run and
/// mirrors every terminal verdict above it.
///
/// The bar draws on stdout so verdict lines and progress share one
/// stream.
pub struct ProgressReporter {
    bar: ProgressBar,
    target_identifier: String,
}

impl ProgressReporter {
    pub fn new(units: u64, target_identifier: impl Into<String>) -> Arc<Self> {
        let bar = ProgressBar::with_draw_target(Some(units), ProgressDrawTarget::stdout());
        let style = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);

        Arc::new(Self {
            bar,
            target_identifier: target_identifier.into(),
        })
    }

    /// Prints a line above the bar without tearing it.
    pub fn note(&self, line: impl AsRef<str>) {
        self.bar.println(line);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl StatusListener for ProgressReporter {
    fn status_changed(&self, case: &TestCase) {
        let Some(status) = case.status(&self.target_identifier) else {
            return;
        };
        if !status.is_terminal() {
            return;
        }

        let identifier = case
            .identifier()
            .unwrap_or_else(|_| "<unidentified>".to_string());
        self.bar.println(format!(
            "Test case [{}] executed at target [{}]: {}",
            identifier, self.target_identifier, status
        ));
        self.bar.inc(1);
    }
}
