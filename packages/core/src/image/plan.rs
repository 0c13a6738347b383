//! Build plan: stages as ordered lists of layer operations
//!
//! The production stage starts from a base image and provisions the whole
//! environment. The debug stage is production plus exactly two recorded
//! deltas: one debug-support package and the entrypoint substitution.
//! Nothing here touches a filesystem; [`super::snapshot`] applies the ops.

use super::error::AssemblyError;
use super::manifest::{Package, PackageManager, packages_for};
use super::source::{CONTEXT_AGENT_DIR, CONTEXT_INIT_BINARY};
use super::target::BuildTarget;
use crate::config::Config;
use crate::config::schema::join_image_path;
use crate::init::ForwardedSignals;
use serde::Serialize;

/// File name of the active agent script
pub const AGENT_SCRIPT: &str = "wptagent.py";

/// File name of the instrumented agent script in the source tree
pub const DEBUG_AGENT_SCRIPT: &str = "wptagent_debug.py";

/// File name the production script is preserved under in debug images
pub const STARTER_SCRIPT: &str = "wptagent_starter.py";

/// Vendor apt repository for the browser
pub const CHROME_APT_SOURCE_NAME: &str = "google-chrome";
pub const CHROME_APT_KEY_URL: &str = "https://dl-ssl.google.com/linux/linux_signing_key.pub";
pub const CHROME_APT_REPOSITORY: &str = "http://dl.google.com/linux/chrome/deb/ stable main";

/// One recorded delta applied on top of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LayerOp {
    /// Register a signed third-party apt repository
    AddAptSource {
        name: String,
        key_url: String,
        repository: String,
    },
    /// Install packages with one package manager
    InstallPackages {
        manager: PackageManager,
        packages: Vec<String>,
    },
    /// Install the pip requirements listed in a context file
    InstallRequirements { from: String },
    /// Point system time configuration at the TIMEZONE build argument
    SetTimezone,
    /// Rebuild the fontconfig cache
    RebuildFontCache,
    /// Copy one context file into the image
    CopyFile {
        from: String,
        to: String,
        mode: Option<u32>,
    },
    /// Copy a context directory into the image
    CopyTree { from: String, to: String },
    SetWorkdir { path: String },
    /// Rename `path` aside to `preserve_as` and install `replacement` at `path`
    SubstituteFile {
        path: String,
        replacement: String,
        preserve_as: String,
    },
    /// Declare the init process and the command it supervises
    SetEntrypoint {
        init: Vec<String>,
        command: Vec<String>,
    },
}

impl LayerOp {
    /// Short human-readable description for plan tables and manifests
    pub fn describe(&self) -> String {
        match self {
            LayerOp::AddAptSource { name, .. } => format!("add apt source {name}"),
            LayerOp::InstallPackages { manager, packages } => {
                format!("install {} {} package(s)", packages.len(), manager)
            }
            LayerOp::InstallRequirements { from } => format!("install pip requirements from {from}"),
            LayerOp::SetTimezone => "configure timezone".to_string(),
            LayerOp::RebuildFontCache => "rebuild font cache".to_string(),
            LayerOp::CopyFile { from, to, .. } => format!("copy {from} -> {to}"),
            LayerOp::CopyTree { from, to } => format!("copy tree {from}/ -> {to}/"),
            LayerOp::SetWorkdir { path } => format!("workdir {path}"),
            LayerOp::SubstituteFile {
                path,
                replacement,
                preserve_as,
            } => format!("move {path} -> {preserve_as}, install {replacement} at {path}"),
            LayerOp::SetEntrypoint { init, command } => {
                format!("entrypoint {} {}", init.join(" "), command.join(" "))
            }
        }
    }

    /// Packages this op installs directly (requirements files excluded)
    pub fn declared_packages(&self) -> Vec<Package> {
        match self {
            LayerOp::InstallPackages { manager, packages } => packages_for(*manager, packages),
            _ => Vec::new(),
        }
    }
}

/// Where a stage starts from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "ref", rename_all = "snake_case")]
pub enum StageBase {
    Image(String),
    Stage(BuildTarget),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub target: BuildTarget,
    pub base: StageBase,
    pub ops: Vec<LayerOp>,
}

/// Ordered stages of an image build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    stages: Vec<Stage>,
}

impl BuildPlan {
    /// Assemble stages from explicit parts and check the debug policy
    pub fn new(stages: Vec<Stage>) -> Result<Self, AssemblyError> {
        let plan = Self { stages };
        plan.validate()?;
        Ok(plan)
    }

    /// The production/debug plan for a configuration
    pub fn from_config(config: &Config) -> Self {
        let agent_script = config.agent_script_path();
        let mut apt = config.apt_packages.clone();
        if !config.browser_package.is_empty() && !apt.contains(&config.browser_package) {
            apt.push(config.browser_package.clone());
        }

        let mut production = vec![
            LayerOp::AddAptSource {
                name: CHROME_APT_SOURCE_NAME.to_string(),
                key_url: CHROME_APT_KEY_URL.to_string(),
                repository: CHROME_APT_REPOSITORY.to_string(),
            },
            LayerOp::InstallPackages {
                manager: PackageManager::Apt,
                packages: apt,
            },
            LayerOp::SetTimezone,
            LayerOp::RebuildFontCache,
        ];
        if !config.npm_packages.is_empty() {
            production.push(LayerOp::InstallPackages {
                manager: PackageManager::Npm,
                packages: config.npm_packages.clone(),
            });
        }
        production.extend([
            LayerOp::InstallRequirements {
                from: context_agent_path(&config.requirements_file),
            },
            LayerOp::CopyFile {
                from: CONTEXT_INIT_BINARY.to_string(),
                to: config.init_path.clone(),
                mode: Some(0o755),
            },
            LayerOp::CopyTree {
                from: CONTEXT_AGENT_DIR.to_string(),
                to: config.agent_root.clone(),
            },
            LayerOp::SetWorkdir {
                path: config.agent_root.clone(),
            },
            LayerOp::SetEntrypoint {
                init: init_argv(config),
                command: vec![config.shell.clone(), config.entrypoint_script_path()],
            },
        ]);

        let debug = vec![
            LayerOp::InstallPackages {
                manager: PackageManager::Pip,
                packages: vec![config.debug_package.clone()],
            },
            LayerOp::SubstituteFile {
                path: agent_script,
                replacement: context_agent_path(DEBUG_AGENT_SCRIPT),
                preserve_as: join_image_path(&config.agent_root, STARTER_SCRIPT),
            },
        ];

        Self {
            stages: vec![
                Stage {
                    target: BuildTarget::Production,
                    base: StageBase::Image(config.base_image.clone()),
                    ops: production,
                },
                Stage {
                    target: BuildTarget::Debug,
                    base: StageBase::Stage(BuildTarget::Production),
                    ops: debug,
                },
            ],
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, target: BuildTarget) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.target == target)
    }

    /// Stages applied, in order, to build `target`
    pub fn stage_chain(&self, target: BuildTarget) -> Result<Vec<&Stage>, AssemblyError> {
        let mut chain = Vec::new();
        let mut current = Some(target);
        while let Some(wanted) = current {
            let stage = self.stage(wanted).ok_or_else(|| {
                AssemblyError::InvalidPlan(format!("no stage defined for target '{wanted}'"))
            })?;
            if chain.iter().any(|s: &&Stage| s.target == wanted) {
                return Err(AssemblyError::InvalidPlan(format!(
                    "stage '{wanted}' extends itself"
                )));
            }
            chain.push(stage);
            current = match &stage.base {
                StageBase::Image(_) => None,
                StageBase::Stage(parent) => Some(*parent),
            };
        }
        chain.reverse();
        Ok(chain)
    }

    /// Check that debug is a strict superposition over production
    ///
    /// Debug must extend production and carry exactly one single-package
    /// install plus exactly one file substitution.
    pub fn validate(&self) -> Result<(), AssemblyError> {
        let production = self.stage(BuildTarget::Production).ok_or_else(|| {
            AssemblyError::InvalidPlan("missing production stage".to_string())
        })?;
        if !matches!(production.base, StageBase::Image(_)) {
            return Err(AssemblyError::InvalidPlan(
                "production must start from a base image".to_string(),
            ));
        }

        let Some(debug) = self.stage(BuildTarget::Debug) else {
            return Ok(());
        };
        if debug.base != StageBase::Stage(BuildTarget::Production) {
            return Err(AssemblyError::InvalidPlan(
                "debug must extend the production stage".to_string(),
            ));
        }
        if debug.ops.len() != 2 {
            return Err(AssemblyError::InvalidPlan(format!(
                "debug must add exactly two operations, found {}",
                debug.ops.len()
            )));
        }
        let installs: Vec<_> = debug
            .ops
            .iter()
            .filter(|op| matches!(op, LayerOp::InstallPackages { packages, .. } if packages.len() == 1))
            .collect();
        let substitutions = debug
            .ops
            .iter()
            .filter(|op| matches!(op, LayerOp::SubstituteFile { .. }))
            .count();
        if installs.len() != 1 || substitutions != 1 {
            return Err(AssemblyError::InvalidPlan(
                "debug must install one package and substitute one file".to_string(),
            ));
        }
        Ok(())
    }

    /// The single package the debug stage adds, if a debug stage exists
    pub fn debug_support_package(&self) -> Option<Package> {
        self.stage(BuildTarget::Debug)?
            .ops
            .iter()
            .flat_map(LayerOp::declared_packages)
            .next()
    }
}

/// Init process argv up to `--`; the configured signal set travels as flags
fn init_argv(config: &Config) -> Vec<String> {
    let mut argv = vec![config.init_path.clone()];
    match ForwardedSignals::parse(&config.forward_signals) {
        Ok(signals) => argv.extend(signals.to_init_args()),
        // Unknown names are left for wpt-init to reject at start
        Err(_) => {
            for name in &config.forward_signals {
                argv.extend(["--signal".to_string(), name.clone()]);
            }
        }
    }
    argv.push("--".to_string());
    argv
}

fn context_agent_path(relative: &str) -> String {
    format!(
        "{CONTEXT_AGENT_DIR}/{}",
        relative.trim_start_matches("./").trim_start_matches('/')
    )
}
