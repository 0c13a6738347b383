//! Config show subcommand
//!
//! Displays current configuration in table or JSON format.
//! Uses serde serialization to automatically include all Config fields.

use anyhow::{Result, anyhow};
use comfy_table::{Cell, Color, Table};
use serde_json::Value;
use wptagent_image_core::{Config, config};

/// Show current configuration
pub fn cmd_config_show(config: &Config, json: bool, _quiet: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    show_table(config)
}

fn show_table(config: &Config) -> Result<()> {
    let value = serde_json::to_value(config)?;
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow!("Config did not serialize to an object"))?;

    let mut table = Table::new();
    table.set_header(vec!["Key", "Value"]);

    for (key, val) in obj {
        let display_value = format_value(val);
        let cell = apply_cell_styling(key, val, display_value);
        table.add_row(vec![Cell::new(key), cell]);
    }

    println!("{table}");

    if let Some(path) = config::get_config_path() {
        println!();
        println!("Config file: {}", path.display());
    }

    Ok(())
}

/// Format a JSON value for display
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "(not set)".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(arr) => format_array(arr),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn format_array(arr: &[Value]) -> String {
    if arr.is_empty() {
        return "(none)".to_string();
    }

    arr.iter()
        .filter_map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Highlight a debug default target, which would ship the instrumented agent
fn apply_cell_styling(key: &str, value: &Value, display_value: String) -> Cell {
    if key == "default_target" && value.as_str() == Some("debug") {
        return Cell::new(display_value).fg(Color::Yellow);
    }
    Cell::new(display_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value_preserves_normal_strings() {
        let val = Value::String("Etc/UTC".to_string());
        assert_eq!(format_value(&val), "Etc/UTC");
    }

    #[test]
    fn test_format_value_formats_arrays() {
        let val = Value::Array(vec![
            Value::String("TERM".to_string()),
            Value::String("INT".to_string()),
        ]);
        assert_eq!(format_value(&val), "TERM, INT");
    }

    #[test]
    fn test_format_value_shows_none_for_empty_array() {
        assert_eq!(format_value(&Value::Array(vec![])), "(none)");
    }

    #[test]
    fn test_all_config_fields_serialize() {
        let value = serde_json::to_value(Config::default()).expect("Config should serialize");
        let obj = value.as_object().expect("Should be an object");

        assert!(obj.contains_key("version"));
        assert!(obj.contains_key("default_target"));
        assert!(obj.contains_key("timezone"));
        assert!(obj.contains_key("forward_signals"));
    }
}
