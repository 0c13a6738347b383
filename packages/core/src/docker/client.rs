//! Docker client wrapper

use super::DockerError;
use bollard::Docker;
use tracing::debug;

/// Connection to the local Docker daemon
pub struct DockerClient {
    inner: Docker,
}

impl DockerClient {
    /// Connect using the platform defaults (`DOCKER_HOST` or the local socket)
    pub fn new() -> Result<Self, DockerError> {
        let inner = Docker::connect_with_local_defaults().map_err(DockerError::from)?;
        Ok(Self { inner })
    }

    /// Ping the daemon so connection problems surface before a build starts
    pub async fn verify_connection(&self) -> Result<(), DockerError> {
        debug!("Pinging Docker daemon");
        self.inner.ping().await.map_err(DockerError::from)?;
        Ok(())
    }

    pub fn inner(&self) -> &Docker {
        &self.inner
    }
}
