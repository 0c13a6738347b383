//! Docker-specific error types

use thiserror::Error;

/// Errors from talking to the Docker daemon
#[derive(Error, Debug)]
pub enum DockerError {
    #[error("Docker is not running or not responding")]
    NotRunning,

    #[error("Docker socket not found")]
    SocketNotFound,

    #[error("Permission denied accessing the Docker socket")]
    PermissionDenied,

    #[error("Docker connection error: {0}")]
    Connection(String),

    #[error("Docker API error ({status_code}): {message}")]
    Api { status_code: u16, message: String },

    #[error("Image build failed: {0}")]
    Build(String),

    #[error("Image operation failed: {0}")]
    Image(String),
}

impl From<bollard::errors::Error> for DockerError {
    fn from(err: bollard::errors::Error) -> Self {
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code,
                message,
            } => DockerError::Api {
                status_code,
                message,
            },
            other => classify_connection_error(&other.to_string()),
        }
    }
}

fn classify_connection_error(msg: &str) -> DockerError {
    let lower = msg.to_lowercase();
    if lower.contains("permission denied") {
        DockerError::PermissionDenied
    } else if lower.contains("no such file or directory") {
        DockerError::SocketNotFound
    } else if lower.contains("connection refused") || lower.contains("timed out") {
        DockerError::NotRunning
    } else {
        DockerError::Connection(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_socket_failures() {
        assert!(matches!(
            classify_connection_error("connect: Permission denied (os error 13)"),
            DockerError::PermissionDenied
        ));
        assert!(matches!(
            classify_connection_error("No such file or directory (os error 2)"),
            DockerError::SocketNotFound
        ));
        assert!(matches!(
            classify_connection_error("Connection refused (os error 111)"),
            DockerError::NotRunning
        ));
        assert!(matches!(
            classify_connection_error("tls handshake failed"),
            DockerError::Connection(_)
        ));
    }
}
