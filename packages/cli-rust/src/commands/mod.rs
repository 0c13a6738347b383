//! Command implementations
//!
//! Each subcommand lives in its own module with an `*Args` struct and a
//! `cmd_*` handler.

mod assemble;
mod build;
mod clean;
mod config;
mod dockerfile;
mod plan;

pub use assemble::{AssembleArgs, cmd_assemble};
pub use build::{BuildArgs, cmd_build};
pub use clean::{CleanArgs, cmd_clean};
pub use config::{ConfigArgs, cmd_config};
pub use dockerfile::{DockerfileArgs, cmd_dockerfile};
pub use plan::{PlanArgs, cmd_plan};

use anyhow::{Result, anyhow};
use std::path::PathBuf;
use wptagent_image_core::Config;
use wptagent_image_core::config::validate_config;

/// `wpt-init` next to the running executable, if it was built alongside
pub(crate) fn sibling_init_binary() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let candidate = exe.parent()?.join("wpt-init");
    candidate.is_file().then_some(candidate)
}

/// Config with command-line overrides applied, checked like stored values
pub(crate) fn with_overrides(
    config: &Config,
    timezone: Option<&str>,
    tag: Option<&str>,
) -> Result<Config> {
    let mut effective = config.clone();
    if let Some(timezone) = timezone {
        effective.timezone = timezone.to_string();
    }
    if let Some(tag) = tag {
        effective.image_tag = tag.to_string();
    }
    if let Err(e) = validate_config(&effective) {
        return Err(anyhow!("Invalid --{}: {}", e.field.replace("image_", ""), e.message));
    }
    Ok(effective)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let effective =
            with_overrides(&Config::default(), Some("Asia/Tokyo"), Some("2024.05")).unwrap();
        assert_eq!(effective.timezone, "Asia/Tokyo");
        assert_eq!(effective.image_tag, "2024.05");
    }

    #[test]
    fn invalid_overrides_name_the_flag() {
        let err = with_overrides(&Config::default(), Some("../x"), None).unwrap_err();
        assert!(err.to_string().starts_with("Invalid --timezone"));

        let err = with_overrides(&Config::default(), None, Some("-bad")).unwrap_err();
        assert!(err.to_string().starts_with("Invalid --tag"));
    }
}
