//! Clean command implementation
//!
//! Removes every image labelled as built by wptagent-image.

use crate::output::{CommandSpinner, format_docker_error, show_docker_error};
use anyhow::{Result, anyhow};
use clap::Args;
use console::style;
use dialoguer::Confirm;
use wptagent_image_core::docker::{DockerClient, remove_built_images};

/// Arguments for the clean command
#[derive(Args)]
pub struct CleanArgs {
    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,

    /// Remove images even when containers still reference them
    #[arg(long)]
    pub force: bool,
}

pub async fn cmd_clean(args: &CleanArgs, quiet: bool) -> Result<()> {
    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt("Remove all wptagent images built by this tool?")
            .default(false)
            .interact()?;
        if !confirmed {
            if !quiet {
                println!("Clean cancelled.");
            }
            return Ok(());
        }
    }

    let client = DockerClient::new().map_err(|e| anyhow!("{}", format_docker_error(&e)))?;
    client
        .verify_connection()
        .await
        .map_err(|e| anyhow!("{}", format_docker_error(&e)))?;

    let spinner = CommandSpinner::new_maybe("Removing images...", quiet);
    match remove_built_images(&client, args.force).await {
        Ok(0) => {
            spinner.success("No images to remove");
        }
        Ok(removed) => {
            spinner.success(&format!("Removed {removed} image(s)"));
        }
        Err(e) => {
            spinner.fail("Failed to remove images");
            show_docker_error(&e);
            return Err(e.into());
        }
    }

    if !quiet {
        println!("{}", style("Build cache is left to `docker builder prune`.").dim());
    }
    Ok(())
}
