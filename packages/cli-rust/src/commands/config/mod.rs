//! Config subcommand implementations
//!
//! Provides `wptagent-image config` subcommands for viewing and managing
//! configuration.

mod reset;
mod set;
mod show;
mod validate;

use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};
use wptagent_image_core::{Config, config};

pub use reset::cmd_config_reset;
pub use set::{cmd_config_get, cmd_config_set};
pub use show::cmd_config_show;
pub use validate::cmd_config_validate;

/// Configuration command arguments
#[derive(Args)]
pub struct ConfigArgs {
    /// Output as JSON instead of table format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

/// Configuration management subcommands
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Show current configuration
    Show {
        /// Output as JSON instead of table format
        #[arg(long)]
        json: bool,
    },
    /// Get a single configuration value
    Get {
        /// Configuration key (e.g., "timezone", "default_target")
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Configuration key to set
        key: String,
        /// New value; list fields take a comma-separated list
        value: String,
    },
    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
    /// Print the config file path
    Path,
    /// Check the configuration and report problems
    Validate,
}

/// Handle config command
///
/// Routes to the appropriate handler based on the subcommand.
/// If no subcommand is given, defaults to Show.
pub fn cmd_config(args: ConfigArgs, config: &Config, quiet: bool) -> Result<()> {
    match args.command {
        Some(ConfigSubcommands::Show { json }) => cmd_config_show(config, json, quiet),
        Some(ConfigSubcommands::Get { key }) => cmd_config_get(config, &key),
        Some(ConfigSubcommands::Set { key, value }) => cmd_config_set(config, &key, &value, quiet),
        Some(ConfigSubcommands::Reset { force }) => cmd_config_reset(config, force, quiet),
        Some(ConfigSubcommands::Path) => {
            let path = config::get_config_path()
                .ok_or_else(|| anyhow!("Could not determine config path"))?;
            println!("{}", path.display());
            Ok(())
        }
        Some(ConfigSubcommands::Validate) => cmd_config_validate(config, quiet),
        None => {
            // Default to show when no subcommand given
            cmd_config_show(config, args.json, quiet)
        }
    }
}
