//! Launch error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while starting or supervising the agent
#[derive(Error, Debug)]
pub enum LaunchError {
    /// `--` was followed by a shell but no entrypoint script
    #[error("Expected '<shell> <entrypoint-script>' after '--', got only '{0}'")]
    IncompleteCommand(String),

    #[error("{what} not found: {}", path.display())]
    Missing { what: &'static str, path: PathBuf },

    #[error("{what} is not executable: {}", path.display())]
    NotExecutable { what: &'static str, path: PathBuf },

    #[error("Unknown signal '{0}'")]
    UnknownSignal(String),

    #[error("Failed to spawn {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to install handler for SIG{signal}: {source}")]
    SignalRegistration {
        signal: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("waitpid failed: {0}")]
    Wait(#[source] io::Error),
}

impl LaunchError {
    /// Exit status the init process reports for this failure.
    ///
    /// Follows shell conventions: 127 when the command cannot be found, 126
    /// when it cannot be executed.
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::Missing { .. } => 127,
            LaunchError::NotExecutable { .. } => 126,
            LaunchError::Spawn { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => 127,
                io::ErrorKind::PermissionDenied => 126,
                _ => 1,
            },
            LaunchError::IncompleteCommand(_) | LaunchError::UnknownSignal(_) => 2,
            LaunchError::SignalRegistration { .. } | LaunchError::Wait(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_shell_conventions() {
        let missing = LaunchError::Missing {
            what: "Entrypoint script",
            path: PathBuf::from("/wptagent/entrypoint.sh"),
        };
        assert_eq!(missing.exit_code(), 127);
        assert!(missing.to_string().contains("/wptagent/entrypoint.sh"));

        let not_exec = LaunchError::NotExecutable {
            what: "Entrypoint script",
            path: PathBuf::from("/wptagent/entrypoint.sh"),
        };
        assert_eq!(not_exec.exit_code(), 126);

        let spawn = LaunchError::Spawn {
            program: PathBuf::from("/bin/bash"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(spawn.exit_code(), 126);
    }

    #[test]
    fn every_launch_error_is_non_zero() {
        let errors = [
            LaunchError::IncompleteCommand("/bin/bash".into()),
            LaunchError::UnknownSignal("KILL".into()),
            LaunchError::Wait(io::Error::other("boom")),
        ];
        for err in errors {
            assert_ne!(err.exit_code(), 0, "{err}");
        }
    }
}
