//! wptagent-image-core - Core library for wptagent-image
//!
//! This library provides the shared functionality for the `wptagent-image`
//! builder and the `wpt-init` container init:
//! - [`image`]: build targets, build plans and offline snapshot assembly
//! - [`docker`]: Dockerfile rendering and BuildKit image builds
//! - [`init`]: the PID-1 supervisor that launches the agent
//! - [`config`]: the JSONC config file and its validation

pub mod config;
pub mod docker;
pub mod image;
pub mod init;

// Re-export commonly used types
pub use config::{Config, ConfigError, load_config, load_config_or_default, save_config};
pub use docker::{DockerClient, DockerError};
pub use image::{AssemblyError, BuildPlan, BuildTarget, Snapshot, assemble, resolve_target};
pub use init::{LaunchError, run_init};

/// Get the version of the core library
pub fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
