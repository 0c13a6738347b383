//! Centralized error formatting
//!
//! Consistent, actionable messages for Docker and assembly errors across
//! all CLI commands.

use anyhow::anyhow;
use console::style;
use wptagent_image_core::docker::DockerError;
use wptagent_image_core::image::AssemblyError;

/// Format Docker errors with actionable guidance
///
/// Returns a styled, multi-line error message with troubleshooting steps.
pub fn format_docker_error(e: &DockerError) -> String {
    match e {
        DockerError::NotRunning => {
            format!(
                "{}\n\n  {}\n  {}\n  {}",
                style("Docker is not responding").red().bold(),
                "Start or restart the Docker daemon:",
                style("  Linux:  sudo systemctl start docker").cyan(),
                style("  Linux:  sudo systemctl restart docker").cyan(),
            )
        }
        DockerError::SocketNotFound => {
            format!(
                "{}\n\n  {}\n  {}\n  {}\n  {}",
                style("Docker socket not found").red().bold(),
                "Docker may not be installed or the service isn't running:",
                style("  Linux:  sudo apt-get install docker.io").cyan(),
                style("  Linux:  sudo systemctl enable --now docker").cyan(),
                "Then verify the socket exists at /var/run/docker.sock (Linux default).",
            )
        }
        DockerError::PermissionDenied => {
            format!(
                "{}\n\n  {}\n  {}\n  {}\n\n  {}\n  {}\n  {}",
                style("Permission denied accessing Docker").red().bold(),
                "Your user likely lacks access to the Docker socket.",
                style("  Check: docker ps").cyan(),
                style("  Check: ls -l /var/run/docker.sock").cyan(),
                "Fix (Linux):",
                style("  sudo usermod -aG docker $USER").cyan(),
                "Then log out and back in (or run: newgrp docker).",
            )
        }
        DockerError::Connection(msg) => {
            format!(
                "{}\n\n  {}",
                style("Cannot connect to Docker").red().bold(),
                msg,
            )
        }
        // Build errors already carry log context and a suggestion
        DockerError::Build(msg) => {
            format!("{}\n\n{}", style("Image build failed").red().bold(), msg)
        }
        _ => e.to_string(),
    }
}

/// Format Docker errors as anyhow::Error
pub fn format_docker_error_anyhow(e: &DockerError) -> anyhow::Error {
    anyhow!("{}", format_docker_error(e))
}

/// Show Docker error in a rich format to stderr
pub fn show_docker_error(e: &DockerError) {
    let msg = format_docker_error(e);
    eprintln!();
    eprintln!("{msg}");
}

/// Format an assembly failure with a hint on what to change
pub fn format_assembly_error(e: &AssemblyError) -> String {
    let hint = match e {
        AssemblyError::PackageUnavailable(_) | AssemblyError::Provisioning { .. } => {
            "Check the package lists in the config (wptagent-image config show) and re-run the build."
        }
        AssemblyError::Substitution { .. } => {
            "The debug image swaps the agent script; make sure wptagent.py exists in --source."
        }
        AssemblyError::MissingSource(_) | AssemblyError::MissingEntrypoint(_) => {
            "Point --source at a wptagent checkout and pass --init-binary if wpt-init is not next to this binary."
        }
        AssemblyError::EntrypointNotExecutable(_) => {
            "Mark the script executable in --source (chmod +x) and re-run."
        }
        AssemblyError::SubstitutionConflict { .. } => {
            "Remove the stale wptagent_starter.py; the debug image creates it from wptagent.py."
        }
        AssemblyError::DebugPackageAlreadyProvisioned(_) => {
            "Remove the debug package from the production requirements; the debug stage adds it."
        }
        AssemblyError::InvalidPlan(_) | AssemblyError::Io { .. } => return e.to_string(),
    };
    format!(
        "{}\n\n  {}\n\n  {} {}",
        style("Image assembly failed").red().bold(),
        e,
        style("Tip:").cyan(),
        hint
    )
}
