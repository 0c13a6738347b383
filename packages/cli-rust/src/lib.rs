//! wptagent-image CLI - Build wptagent container images
//!
//! This module contains the shared CLI implementation used by both binaries:
//! `wptagent-image` (the builder) and `wpt-init` (the container init).

mod commands;
mod init;
mod output;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;
use wptagent_image_core::config::{
    self, display_validation_error, display_validation_warning, validate_config,
};
use wptagent_image_core::{Config, get_version, load_config_or_default};

pub use init::run_init;

/// Build wptagent container images
#[derive(Parser)]
#[command(name = "wptagent-image")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build wptagent container images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Increase verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the layer operations for a build target
    Plan(commands::PlanArgs),
    /// Print the generated multi-stage Dockerfile
    Dockerfile(commands::DockerfileArgs),
    /// Assemble a target offline into a root filesystem directory
    Assemble(commands::AssembleArgs),
    /// Build the image with Docker
    Build(commands::BuildArgs),
    /// Remove images built by this tool
    Clean(commands::CleanArgs),
    /// Manage configuration
    Config(commands::ConfigArgs),
}

/// Log filter for a verbosity level; `RUST_LOG` wins when set
pub(crate) fn log_filter(verbose: u8, quiet: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match (quiet, verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            (false, 2) => "debug",
            (false, _) => "trace",
        };
        EnvFilter::new(level)
    })
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, cli.quiet))
        .with_writer(std::io::stderr)
        .init();

    // Configure color output
    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let Some(command) = cli.command else {
        if !cli.quiet {
            println!(
                "{} {}",
                style("wptagent-image").cyan().bold(),
                style(get_version()).dim()
            );
            println!();
            println!("Run {} for available commands.", style("--help").green());
        }
        return Ok(());
    };

    let config = load_config_or_exit(cli.verbose);

    match command {
        Commands::Config(args) => commands::cmd_config(args, &config, cli.quiet),
        Commands::Plan(args) => {
            check_config(&config, cli.quiet)?;
            commands::cmd_plan(&args, &config)
        }
        Commands::Dockerfile(args) => {
            check_config(&config, cli.quiet)?;
            commands::cmd_dockerfile(&args, &config)
        }
        Commands::Assemble(args) => {
            check_config(&config, cli.quiet)?;
            commands::cmd_assemble(&args, &config, cli.quiet)
        }
        Commands::Build(args) => {
            check_config(&config, cli.quiet)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::cmd_build(&args, &config, cli.quiet, cli.verbose))
        }
        Commands::Clean(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::cmd_clean(&args, cli.quiet))
        }
    }
}

fn load_config_or_exit(verbose: u8) -> Config {
    let config_path = config::get_config_path();
    match load_config_or_default() {
        Ok(config) => {
            if verbose > 0
                && let Some(path) = &config_path
            {
                eprintln!("{} Config: {}", style("[info]").cyan(), path.display());
            }
            config
        }
        Err(e) => {
            // Display rich error for invalid config
            eprintln!("{} Configuration error", style("Error:").red().bold());
            eprintln!();
            eprintln!("  {e}");
            eprintln!();
            if let Some(path) = &config_path {
                eprintln!("  Config file: {}", style(path.display()).yellow());
                eprintln!();
            }
            eprintln!(
                "  {} Check the config file for syntax errors or unknown fields.",
                style("Tip:").cyan()
            );
            std::process::exit(1);
        }
    }
}

fn check_config(config: &Config, quiet: bool) -> Result<()> {
    match validate_config(config) {
        Ok(warnings) => {
            if !quiet {
                for warning in &warnings {
                    display_validation_warning(warning);
                }
            }
            Ok(())
        }
        Err(error) => {
            display_validation_error(&error);
            Err(anyhow!("Invalid configuration: {}", error.field))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn build_flags_parse() {
        let cli = Cli::try_parse_from([
            "wptagent-image",
            "build",
            "--target",
            "debug",
            "--timezone",
            "America/New_York",
            "--no-cache",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Build(_))));
    }

    #[test]
    fn unknown_target_is_rejected() {
        assert!(Cli::try_parse_from(["wptagent-image", "plan", "--target", "staging"]).is_err());
    }
}
