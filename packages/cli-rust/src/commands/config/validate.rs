//! Config validate subcommand

use anyhow::{Result, anyhow};
use console::style;
use wptagent_image_core::Config;
use wptagent_image_core::config::{
    display_validation_error, display_validation_warning, validate_config,
};

pub fn cmd_config_validate(config: &Config, quiet: bool) -> Result<()> {
    match validate_config(config) {
        Ok(warnings) => {
            for warning in &warnings {
                display_validation_warning(warning);
            }
            if !quiet {
                println!("{} Configuration is valid", style("OK:").green().bold());
            }
            Ok(())
        }
        Err(error) => {
            display_validation_error(&error);
            Err(anyhow!("Invalid configuration: {}", error.field))
        }
    }
}
