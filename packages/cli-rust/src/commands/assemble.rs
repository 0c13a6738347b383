//! Assemble command implementation
//!
//! Applies the build plan offline and writes the resulting root filesystem
//! plus a manifest. Nothing is written unless assembly succeeds.

use crate::output::{CommandSpinner, format_assembly_error};
use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use console::style;
use std::fs;
use std::path::PathBuf;
use wptagent_image_core::Config;
use wptagent_image_core::image::{
    AssemblyInputs, BuildContext, BuildPlan, BuildTarget, OpenPackageSource, assemble,
    resolve_target,
};

/// Arguments for the assemble command
#[derive(Args)]
pub struct AssembleArgs {
    /// Build target (default: config default_target, then production)
    #[arg(long, value_enum)]
    pub target: Option<BuildTarget>,

    /// Output directory; receives rootfs/ and manifest.json
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,

    /// wptagent source checkout
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub source: PathBuf,

    /// wpt-init binary to install (default: next to this executable)
    #[arg(long, value_name = "PATH")]
    pub init_binary: Option<PathBuf>,

    /// Timezone identifier (default: config timezone)
    #[arg(long)]
    pub timezone: Option<String>,

    /// Replace an existing rootfs in the output directory
    #[arg(long)]
    pub force: bool,
}

pub fn cmd_assemble(args: &AssembleArgs, config: &Config, quiet: bool) -> Result<()> {
    let config = &super::with_overrides(config, args.timezone.as_deref(), None)?;
    let target = resolve_target(args.target, Some(config.default_target));
    let rootfs = args.out.join("rootfs");
    if rootfs.exists() && !args.force {
        bail!(
            "{} already exists. Re-run with {} to replace it.",
            rootfs.display(),
            style("--force").cyan()
        );
    }

    let init_binary = args.init_binary.clone().or_else(super::sibling_init_binary);
    let ctx = BuildContext::from_source_dir(&args.source, init_binary.as_deref())
        .map_err(|e| anyhow!("{}", format_assembly_error(&e)))?;
    let plan = BuildPlan::from_config(config);
    let inputs = AssemblyInputs {
        timezone: config.timezone.clone(),
    };

    let spinner = CommandSpinner::new_maybe(&format!("Assembling {target}..."), quiet);
    let snapshot = match assemble(&plan, target, &ctx, &inputs, &OpenPackageSource) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            spinner.fail("Assembly failed");
            return Err(anyhow!("{}", format_assembly_error(&e)));
        }
    };

    // Export next to the final location, then swap in
    spinner.update("Writing root filesystem...");
    fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create {}", args.out.display()))?;
    let staging = args.out.join(".rootfs.partial");
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    let written = snapshot
        .export_rootfs(&staging)
        .map_err(|e| anyhow!("{}", format_assembly_error(&e)))?;
    if rootfs.exists() {
        fs::remove_dir_all(&rootfs)
            .with_context(|| format!("Failed to remove {}", rootfs.display()))?;
    }
    fs::rename(&staging, &rootfs)?;

    let manifest_path = args.out.join("manifest.json");
    let mut manifest = serde_json::to_string_pretty(&snapshot.manifest())?;
    manifest.push('\n');
    fs::write(&manifest_path, manifest)
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

    spinner.success(&format!("Assembled {target} ({written} files)"));
    if !quiet {
        println!();
        println!("  {} {}", style("Digest:").dim(), snapshot.digest());
        println!("  {} {}", style("Rootfs:").dim(), rootfs.display());
        println!("  {} {}", style("Manifest:").dim(), manifest_path.display());
    }
    Ok(())
}
