//! Offline image assembly
//!
//! Walks the stage chain of a target and applies each stage to the snapshot
//! of its base. Debug therefore starts from the very production snapshot an
//! explicit production build would produce.

use super::error::AssemblyError;
use super::manifest::PackageSource;
use super::plan::{BuildPlan, StageBase};
use super::snapshot::{AssemblyInputs, Snapshot};
use super::source::BuildContext;
use super::target::BuildTarget;
use tracing::info;

/// Assemble the snapshot for `target`
pub fn assemble(
    plan: &BuildPlan,
    target: BuildTarget,
    ctx: &BuildContext,
    inputs: &AssemblyInputs,
    source: &dyn PackageSource,
) -> Result<Snapshot, AssemblyError> {
    plan.validate()?;
    let chain = plan.stage_chain(target)?;

    let mut current: Option<Snapshot> = None;
    for stage in chain {
        let base = match (&stage.base, current.take()) {
            (StageBase::Image(image), _) => Snapshot::base(image.clone()),
            (StageBase::Stage(_), Some(parent)) => parent,
            (StageBase::Stage(parent), None) => {
                return Err(AssemblyError::InvalidPlan(format!(
                    "stage '{}' extends '{parent}' which was not built",
                    stage.target
                )));
            }
        };

        info!("Assembling stage {} ({} op(s))", stage.target, stage.ops.len());
        let next = base.extend(stage.target, &stage.ops, ctx, inputs, source)?;

        if stage.target == BuildTarget::Debug
            && let Some(debug_pkg) = plan.debug_support_package()
            && base.packages().contains(&debug_pkg)
        {
            return Err(AssemblyError::DebugPackageAlreadyProvisioned(debug_pkg));
        }

        current = Some(next);
    }

    current.ok_or_else(|| AssemblyError::InvalidPlan(format!("no stages for target '{target}'")))
}
