//! Build command implementation
//!
//! Checks the plan offline first, so a debug build whose agent script is
//! missing fails before anything is sent to Docker, then builds the selected
//! target with BuildKit.

use crate::output::{format_assembly_error, format_docker_error, show_docker_error};
use anyhow::{Result, anyhow};
use clap::Args;
use console::style;
use std::path::PathBuf;
use std::time::Instant;
use wptagent_image_core::Config;
use wptagent_image_core::docker::{
    BuildRequest, DockerClient, ProgressReporter, build_image, render_dockerfile,
};
use wptagent_image_core::image::{
    AssemblyInputs, BuildContext, BuildPlan, BuildTarget, OpenPackageSource, assemble,
    resolve_target,
};

/// Arguments for the build command
#[derive(Args)]
pub struct BuildArgs {
    /// Build target (default: config default_target, then production)
    #[arg(long, value_enum)]
    pub target: Option<BuildTarget>,

    /// Image tag; debug builds append "-debug" (default: config image_tag)
    #[arg(long)]
    pub tag: Option<String>,

    /// Timezone identifier baked into the image (default: config timezone)
    #[arg(long)]
    pub timezone: Option<String>,

    /// wptagent source checkout used as the build context
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub source: PathBuf,

    /// wpt-init binary to install (default: next to this executable)
    #[arg(long, value_name = "PATH")]
    pub init_binary: Option<PathBuf>,

    /// Build without the Docker layer cache
    #[arg(long)]
    pub no_cache: bool,

    /// Stream raw build output instead of a spinner
    #[arg(long)]
    pub plain: bool,
}

pub async fn cmd_build(args: &BuildArgs, config: &Config, quiet: bool, verbose: u8) -> Result<()> {
    let target = resolve_target(args.target, Some(config.default_target));

    let effective =
        super::with_overrides(config, args.timezone.as_deref(), args.tag.as_deref())?;
    let image = effective.image_reference(target, None);

    let init_binary = args.init_binary.clone().or_else(super::sibling_init_binary);
    if init_binary.is_none() {
        return Err(anyhow!(
            "wpt-init binary not found next to this executable.\n\n  {} pass {}",
            style("Tip:").cyan(),
            style("--init-binary <PATH>").cyan()
        ));
    }
    let ctx = BuildContext::from_source_dir(&args.source, init_binary.as_deref())
        .map_err(|e| anyhow!("{}", format_assembly_error(&e)))?;

    let plan = BuildPlan::from_config(&effective);
    let inputs = AssemblyInputs {
        timezone: effective.timezone.clone(),
    };
    let snapshot = assemble(&plan, target, &ctx, &inputs, &OpenPackageSource)
        .map_err(|e| anyhow!("{}", format_assembly_error(&e)))?;
    tracing::info!("Offline assembly OK, snapshot {}", snapshot.digest());

    let dockerfile = render_dockerfile(&plan, &effective.timezone);

    let client = DockerClient::new().map_err(|e| anyhow!("{}", format_docker_error(&e)))?;
    client
        .verify_connection()
        .await
        .map_err(|e| anyhow!("{}", format_docker_error(&e)))?;

    if !quiet {
        eprintln!(
            "{} {} ({}, timezone {})",
            style("Building").cyan().bold(),
            style(&image).bold(),
            target,
            effective.timezone
        );
    }

    let mut progress = if quiet {
        ProgressReporter::hidden()
    } else if args.plain || verbose > 0 {
        ProgressReporter::plain()
    } else {
        ProgressReporter::new()
    };
    let request = BuildRequest {
        dockerfile: &dockerfile,
        context: &ctx,
        target,
        image: &image,
        timezone: &effective.timezone,
        no_cache: args.no_cache,
    };

    let started = Instant::now();
    match build_image(&client, &request, &mut progress).await {
        Ok(image_id) => {
            if !quiet {
                let elapsed = humantime::format_duration(std::time::Duration::from_secs(
                    started.elapsed().as_secs(),
                ));
                println!();
                println!(
                    "{} Built {} in {elapsed}",
                    style("Success:").green().bold(),
                    style(&image).cyan()
                );
                println!("  {} {image_id}", style("Image ID:").dim());
            }
            Ok(())
        }
        Err(e) => {
            show_docker_error(&e);
            Err(anyhow!("Build of {image} failed"))
        }
    }
}
