//! Config reset subcommand
//!
//! Puts every build setting back to its default. The fields that would
//! change are listed before asking.

use anyhow::Result;
use console::style;
use dialoguer::Confirm;
use serde_json::Value;
use wptagent_image_core::config::get_config_path;
use wptagent_image_core::{Config, save_config};

/// Reset configuration to defaults
///
/// Prompts for confirmation unless --force is specified.
pub fn cmd_config_reset(current: &Config, force: bool, quiet: bool) -> Result<()> {
    let defaults = Config::default();
    let changed = changed_fields(current, &defaults)?;
    if changed.is_empty() && get_config_path().is_some_and(|p| p.exists()) {
        if !quiet {
            println!("Build settings already match the defaults; nothing to reset.");
        }
        return Ok(());
    }

    if !force {
        if !quiet && !changed.is_empty() {
            println!("These settings will return to their defaults:");
            for field in &changed {
                println!("  {}", style(field).yellow());
            }
            println!();
        }
        let confirmed = Confirm::new()
            .with_prompt("Reset wptagent-image build settings? Images already built are not affected.")
            .default(false)
            .interact()?;

        if !confirmed {
            if !quiet {
                println!("Reset cancelled.");
            }
            return Ok(());
        }
    }

    let path = save_config(&defaults)?;

    if !quiet {
        println!(
            "{} Reset {} setting(s); next build uses {} ({})",
            style("Success:").green().bold(),
            changed.len(),
            style(defaults.image_reference(defaults.default_target, None)).cyan(),
            path.display()
        );
    }

    Ok(())
}

/// Top-level keys whose values differ between two configs, in file order
fn changed_fields(current: &Config, defaults: &Config) -> Result<Vec<String>> {
    let Value::Object(current) = serde_json::to_value(current)? else {
        return Ok(Vec::new());
    };
    let defaults = serde_json::to_value(defaults)?;
    Ok(current
        .iter()
        .filter(|(key, value)| defaults.get(key.as_str()) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_nothing_to_reset() {
        let config = Config::default();
        assert!(changed_fields(&config, &Config::default()).unwrap().is_empty());
    }

    #[test]
    fn customised_fields_are_listed() {
        let config = Config {
            timezone: "Asia/Tokyo".to_string(),
            forward_signals: vec!["TERM".to_string()],
            ..Config::default()
        };
        let mut changed = changed_fields(&config, &Config::default()).unwrap();
        changed.sort();
        assert_eq!(changed, vec!["forward_signals", "timezone"]);
    }
}
