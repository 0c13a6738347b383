//! Image assembly model
//!
//! This module describes how the wptagent image is put together:
//! - Build targets and default-target resolution
//! - The provisioning manifest and package sources
//! - Build plans as ordered layer operations per stage
//! - Immutable snapshots produced by applying a plan offline

mod assemble;
mod error;
pub mod manifest;
pub mod plan;
pub mod snapshot;
pub mod source;
pub mod target;

pub use assemble::assemble;
pub use error::AssemblyError;
pub use manifest::{
    CatalogPackageSource, OpenPackageSource, Package, PackageManager, PackageSource,
    ProvisionedEnvironment,
};
pub use plan::{
    AGENT_SCRIPT, BuildPlan, DEBUG_AGENT_SCRIPT, LayerOp, STARTER_SCRIPT, Stage, StageBase,
};
pub use snapshot::{AssemblyInputs, Entrypoint, LayerRecord, Snapshot, SnapshotManifest};
pub use source::{BuildContext, CONTEXT_AGENT_DIR, CONTEXT_INIT_BINARY};
pub use target::{BuildTarget, DEFAULT_BUILD_TARGET, resolve_target};
