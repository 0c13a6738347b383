//! Config get/set subcommands
//!
//! Keys are the serialized field names of [`Config`]; values are coerced to
//! the field's JSON type and the result is validated before saving.

use anyhow::{Result, anyhow, bail};
use console::style;
use serde_json::Value;
use wptagent_image_core::config::{display_validation_warning, validate_config};
use wptagent_image_core::{Config, save_config};

/// Print one value; lists are printed one per line
pub fn cmd_config_get(config: &Config, key: &str) -> Result<()> {
    let value = serde_json::to_value(config)?;
    let field = lookup(&value, key)?;
    match field {
        Value::String(s) => println!("{s}"),
        Value::Array(items) => {
            for item in items {
                println!("{}", item.as_str().unwrap_or_default());
            }
        }
        other => println!("{other}"),
    }
    Ok(())
}

pub fn cmd_config_set(config: &Config, key: &str, raw: &str, quiet: bool) -> Result<()> {
    if key == "version" {
        bail!("version is managed by wptagent-image and cannot be set");
    }
    let updated = apply_value(config, key, raw)?;

    let warnings = validate_config(&updated).map_err(|e| {
        anyhow!(
            "{}: {}\n\n  {} {}",
            e.field,
            e.message,
            style("Example:").cyan(),
            e.fix_command
        )
    })?;
    let path = save_config(&updated)?;

    if !quiet {
        for warning in &warnings {
            display_validation_warning(warning);
        }
        println!(
            "{} Set {} in {}",
            style("Success:").green().bold(),
            style(key).cyan(),
            path.display()
        );
    }
    Ok(())
}

fn lookup<'a>(value: &'a Value, key: &str) -> Result<&'a Value> {
    value.get(key).ok_or_else(|| {
        let keys: Vec<&str> = value
            .as_object()
            .map(|obj| obj.keys().map(String::as_str).collect())
            .unwrap_or_default();
        anyhow!("Unknown config key '{key}'. Valid keys: {}", keys.join(", "))
    })
}

fn apply_value(config: &Config, key: &str, raw: &str) -> Result<Config> {
    let mut value = serde_json::to_value(config)?;
    let coerced = match lookup(&value, key)? {
        Value::Array(_) => Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        ),
        Value::Number(_) => Value::Number(
            raw.trim()
                .parse::<u64>()
                .map_err(|_| anyhow!("{key} expects a number"))?
                .into(),
        ),
        Value::Bool(_) => Value::Bool(
            raw.trim()
                .parse::<bool>()
                .map_err(|_| anyhow!("{key} expects true or false"))?,
        ),
        _ => Value::String(raw.to_string()),
    };
    if let Some(obj) = value.as_object_mut() {
        obj.insert(key.to_string(), coerced);
    }
    serde_json::from_value(value).map_err(|e| anyhow!("Invalid value for {key}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wptagent_image_core::image::BuildTarget;

    #[test]
    fn string_field_is_replaced() {
        let updated = apply_value(&Config::default(), "timezone", "Asia/Tokyo").unwrap();
        assert_eq!(updated.timezone, "Asia/Tokyo");
    }

    #[test]
    fn enum_field_goes_through_serde() {
        let updated = apply_value(&Config::default(), "default_target", "debug").unwrap();
        assert_eq!(updated.default_target, BuildTarget::Debug);
        assert!(apply_value(&Config::default(), "default_target", "staging").is_err());
    }

    #[test]
    fn list_field_splits_on_commas() {
        let updated = apply_value(&Config::default(), "forward_signals", "TERM, INT,").unwrap();
        assert_eq!(updated.forward_signals, vec!["TERM", "INT"]);
    }

    #[test]
    fn unknown_key_lists_valid_keys() {
        let err = apply_value(&Config::default(), "port", "80").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Unknown config key 'port'"));
        assert!(msg.contains("timezone"));
    }
}
