//! Configuration validation with actionable error messages
//!
//! Validates the configuration and provides exact commands to fix issues.

use super::schema::Config;
use crate::init::ForwardedSignal;
use console::style;

/// A configuration validation error with an actionable fix command
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The config field that has an error
    pub field: String,
    /// Description of what's wrong
    pub message: String,
    /// Exact wptagent-image command to fix the issue
    pub fix_command: String,
}

/// A configuration validation warning (non-fatal)
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The config field with a potential issue
    pub field: String,
    /// Description of the warning
    pub message: String,
    /// Suggested wptagent-image command to address the warning
    pub fix_command: String,
}

fn error(field: &str, message: impl Into<String>, fix_command: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.into(),
        fix_command: fix_command.into(),
    }
}

/// Validate configuration and return warnings or first error
///
/// Validation is performed in order, stopping at the first error.
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>, ValidationError> {
    let mut warnings = Vec::new();

    if config.version != 1 {
        return Err(error(
            "version",
            format!("Unsupported config version {}", config.version),
            "wptagent-image config reset",
        ));
    }

    if !is_valid_image_name(&config.image_name) {
        return Err(error(
            "image_name",
            "image_name must be a lowercase repository name",
            "wptagent-image config set image_name wptagent",
        ));
    }

    if !is_valid_tag(&config.image_tag) {
        return Err(error(
            "image_tag",
            "image_tag must be 1-128 characters of [A-Za-z0-9_.-], not starting with '.' or '-'",
            "wptagent-image config set image_tag latest",
        ));
    }

    if config.base_image.trim().is_empty() {
        return Err(error(
            "base_image",
            "base_image must not be empty",
            "wptagent-image config set base_image ubuntu:22.04",
        ));
    }

    if let Err(msg) = validate_timezone(&config.timezone) {
        return Err(error(
            "timezone",
            msg,
            "wptagent-image config set timezone Etc/UTC",
        ));
    }

    for (field, value, default) in [
        ("agent_root", &config.agent_root, "/wptagent"),
        ("init_path", &config.init_path, "/usr/local/bin/wpt-init"),
        ("shell", &config.shell, "/bin/bash"),
    ] {
        if !value.starts_with('/') {
            return Err(error(
                field,
                format!("{field} must be an absolute path inside the image"),
                format!("wptagent-image config set {field} {default}"),
            ));
        }
    }

    for (field, value, default) in [
        (
            "entrypoint_script",
            &config.entrypoint_script,
            "docker/linux-headless/entrypoint.sh",
        ),
        (
            "requirements_file",
            &config.requirements_file,
            ".github/workflows/requirements.txt",
        ),
    ] {
        if value.is_empty() || value.starts_with('/') || value.split('/').any(|c| c == "..") {
            return Err(error(
                field,
                format!("{field} must be a relative path inside the agent source tree"),
                format!("wptagent-image config set {field} {default}"),
            ));
        }
    }

    let package_fields = config
        .apt_packages
        .iter()
        .map(|p| ("apt_packages", p))
        .chain(config.npm_packages.iter().map(|p| ("npm_packages", p)))
        .chain([
            ("browser_package", &config.browser_package),
            ("debug_package", &config.debug_package),
        ]);
    for (field, package) in package_fields {
        if !is_valid_package_name(package) {
            return Err(error(
                field,
                format!("'{package}' is not a valid package name"),
                "wptagent-image config reset",
            ));
        }
    }

    for name in &config.forward_signals {
        if ForwardedSignal::from_name(name).is_none() {
            return Err(error(
                "forward_signals",
                format!("'{name}' is not a signal that can be forwarded"),
                "wptagent-image config reset",
            ));
        }
    }

    // Warnings (non-fatal)

    if config.forward_signals.is_empty() {
        warnings.push(ValidationWarning {
            field: "forward_signals".to_string(),
            message: "No signals are forwarded; docker stop will wait for the kill timeout"
                .to_string(),
            fix_command: "wptagent-image config reset".to_string(),
        });
    } else if !config
        .forward_signals
        .iter()
        .any(|s| ForwardedSignal::from_name(s) == Some(ForwardedSignal::Term))
    {
        warnings.push(ValidationWarning {
            field: "forward_signals".to_string(),
            message: "SIGTERM is not forwarded; the agent will not see docker stop".to_string(),
            fix_command: "wptagent-image config reset".to_string(),
        });
    }

    if config.apt_packages.iter().any(|p| p == &config.browser_package) {
        warnings.push(ValidationWarning {
            field: "apt_packages".to_string(),
            message: format!(
                "'{}' is listed in apt_packages and as browser_package",
                config.browser_package
            ),
            fix_command: "wptagent-image config reset".to_string(),
        });
    }

    Ok(warnings)
}

/// IANA-style zone identifier: `Area/Location` segments; dots are never allowed
fn validate_timezone(timezone: &str) -> Result<(), String> {
    if timezone.is_empty() {
        return Err("timezone must not be empty".to_string());
    }
    if !timezone
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-' | '+'))
    {
        return Err(format!("'{timezone}' contains invalid characters"));
    }
    if timezone.split('/').any(str::is_empty) {
        return Err(format!("'{timezone}' is not a zone identifier"));
    }
    Ok(())
}

fn is_valid_image_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-' | '/'))
        && !name.starts_with(['.', '_', '-', '/'])
        && !name.ends_with(['.', '_', '-', '/'])
}

fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= 128
        && !tag.starts_with(['.', '-'])
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// apt, npm (including scoped `@org/pkg`) and pip names with optional version pins
fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+' | '@' | '/' | '=' | ':')
        })
}

/// Display a validation error with styled formatting
pub fn display_validation_error(error: &ValidationError) {
    eprintln!();
    eprintln!("{}", style("Error: Configuration error").red().bold());
    eprintln!();
    eprintln!("  {}  {}", style("Field:").dim(), error.field);
    eprintln!("  {}  {}", style("Problem:").dim(), error.message);
    eprintln!();
    eprintln!("{}:", style("To fix, run").dim());
    eprintln!("  {}", style(&error.fix_command).cyan());
    eprintln!();
}

/// Display a validation warning with styled formatting
pub fn display_validation_warning(warning: &ValidationWarning) {
    eprintln!();
    eprintln!(
        "{}",
        style("Warning: Configuration warning").yellow().bold()
    );
    eprintln!();
    eprintln!("  {}  {}", style("Field:").dim(), warning.field);
    eprintln!("  {}  {}", style("Issue:").dim(), warning.message);
    eprintln!();
    eprintln!("{}:", style("To address, run").dim());
    eprintln!("  {}", style(&warning.fix_command).cyan());
    eprintln!();
}
