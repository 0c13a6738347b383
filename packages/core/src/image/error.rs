//! Assembly error types

use super::manifest::Package;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while assembling an image snapshot
///
/// Every variant is fatal for the build in progress; nothing is retried.
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("provisioning failed: package {0} is not available")]
    PackageUnavailable(Package),

    #[error("provisioning failed: {step} requires {requirement}")]
    Provisioning { step: String, requirement: String },

    #[error("substitution failed: no file at {path} to move aside to {preserve_as}")]
    Substitution { path: String, preserve_as: String },

    #[error("substitution failed: {preserve_as} already exists and would be overwritten")]
    SubstitutionConflict { preserve_as: String },

    #[error("build context has no {0}")]
    MissingSource(String),

    #[error("entrypoint {0} is not present in the image")]
    MissingEntrypoint(String),

    #[error("entrypoint script {0} is not executable; wpt-init would refuse to start it")]
    EntrypointNotExecutable(String),

    #[error("debug support package {0} is already installed by production")]
    DebugPackageAlreadyProvisioned(Package),

    #[error("invalid build plan: {0}")]
    InvalidPlan(String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AssemblyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AssemblyError::Io {
            path: path.into(),
            source,
        }
    }
}
