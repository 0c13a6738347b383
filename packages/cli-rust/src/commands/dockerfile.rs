//! Dockerfile command implementation

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use wptagent_image_core::Config;
use wptagent_image_core::docker::render_dockerfile;
use wptagent_image_core::image::BuildPlan;

/// Arguments for the dockerfile command
#[derive(Args)]
pub struct DockerfileArgs {
    /// Write to a file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Print the Dockerfile rendered from the build plan.
///
/// Every stage is emitted; the target is chosen at build time.
pub fn cmd_dockerfile(args: &DockerfileArgs, config: &Config) -> Result<()> {
    let plan = BuildPlan::from_config(config);
    plan.validate()?;
    let dockerfile = render_dockerfile(&plan, &config.timezone);

    match &args.output {
        Some(path) => std::fs::write(path, dockerfile)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            print!("{dockerfile}");
            Ok(())
        }
    }
}
