//! Progress reporting for image builds
//!
//! Spinners for build steps, using indicatif for terminal output. In plain
//! mode (CI logs, `--plain`) no spinners are drawn and the build stream is
//! echoed to stderr instead.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;

/// Progress reporter for Docker builds
pub struct ProgressReporter {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
    plain: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    /// Create a reporter drawing spinners to stderr
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
            plain: false,
        }
    }

    /// Create a reporter that never draws and echoes raw build output instead
    pub fn plain() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            bars: HashMap::new(),
            plain: true,
        }
    }

    /// Create a reporter that shows nothing at all
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            bars: HashMap::new(),
            plain: false,
        }
    }

    pub fn is_plain_output(&self) -> bool {
        self.plain
    }

    /// Create a spinner for indeterminate progress (e.g., build steps)
    pub fn add_spinner(&mut self, id: &str, message: &str) -> &ProgressBar {
        let spinner = self.multi.add(ProgressBar::new_spinner());
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed}] {msg}")
                .expect("valid template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        spinner.set_message(message.to_string());
        if !self.plain {
            spinner.enable_steady_tick(std::time::Duration::from_millis(100));
        }
        self.bars.insert(id.to_string(), spinner);
        self.bars.get(id).expect("just inserted")
    }

    /// Update spinner message, creating the spinner if needed
    pub fn update_spinner(&mut self, id: &str, message: &str) {
        if let Some(spinner) = self.bars.get(id) {
            spinner.set_message(message.to_string());
        } else {
            self.add_spinner(id, message);
        }
    }

    /// Mark a step as complete
    pub fn finish(&mut self, id: &str, message: &str) {
        if let Some(bar) = self.bars.get(id) {
            bar.finish_with_message(message.to_string());
        }
    }

    /// Mark all progress as failed
    pub fn abandon_all(&self, message: &str) {
        for bar in self.bars.values() {
            bar.abandon_with_message(message.to_string());
        }
    }
}
