//! Spinner for long-running commands
//!
//! Shows elapsed time next to the message. In quiet mode every call is a
//! no-op so commands don't need to branch on `--quiet` themselves.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct CommandSpinner {
    bar: Option<ProgressBar>,
}

impl CommandSpinner {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .expect("valid template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    /// Create a spinner unless output is suppressed
    pub fn new_maybe(message: &str, quiet: bool) -> Self {
        if quiet {
            Self { bar: None }
        } else {
            Self::new(message)
        }
    }

    pub fn update(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    pub fn success(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(format!("{} {message}", style("✓").green()));
        }
    }

    pub fn fail(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.abandon_with_message(format!("{} {message}", style("✗").red()));
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.bar.as_ref().map(ProgressBar::elapsed).unwrap_or_default()
    }
}
