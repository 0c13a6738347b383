//! Output utilities for CLI commands
//!
//! Terminal output helpers: a spinner with elapsed time for long-running
//! operations, and actionable formatting for core errors.

pub mod errors;
pub mod spinner;

pub use errors::{format_assembly_error, format_docker_error, show_docker_error};
pub use spinner::CommandSpinner;
