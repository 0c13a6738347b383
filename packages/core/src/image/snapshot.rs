//! Immutable image snapshots
//!
//! A [`Snapshot`] is the filesystem and package state produced by a build
//! stage. [`Snapshot::extend`] applies an ordered list of [`LayerOp`]s and
//! returns a new snapshot; the receiver is never touched, so the production
//! snapshot stays reproducible no matter how many debug builds extend it.

use super::error::AssemblyError;
use super::manifest::{Package, PackageManager, PackageSource, ProvisionedEnvironment};
use super::plan::LayerOp;
use super::source::{BuildContext, parse_requirements};
use super::target::BuildTarget;
use crate::config::schema::join_image_path;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Build-time values that parameterize layer ops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyInputs {
    /// Timezone identifier applied by [`LayerOp::SetTimezone`]
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub contents: Vec<u8>,
    pub mode: u32,
}

impl FileEntry {
    pub fn is_executable(&self) -> bool {
        self.mode & 0o111 != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entrypoint {
    pub init: Vec<String>,
    pub command: Vec<String>,
}

/// One applied layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerRecord {
    pub stage: BuildTarget,
    pub description: String,
    /// Content digest of the snapshot right after this layer
    pub digest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FsState {
    files: BTreeMap<String, FileEntry>,
    packages: ProvisionedEnvironment,
    timezone: Option<String>,
    font_cache: bool,
    workdir: Option<String>,
    entrypoint: Option<Entrypoint>,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    base_image: String,
    stage: Option<BuildTarget>,
    state: Arc<FsState>,
    layers: Arc<[LayerRecord]>,
}

/// Serializable summary written next to an exported root filesystem
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotManifest {
    pub target: Option<BuildTarget>,
    pub base_image: String,
    pub digest: String,
    pub timezone: Option<String>,
    pub workdir: Option<String>,
    pub entrypoint: Option<Entrypoint>,
    pub packages: Vec<String>,
    pub files: usize,
    pub layers: Vec<LayerRecord>,
}

impl Snapshot {
    /// Empty snapshot standing for an unmodified base image
    pub fn base(image: impl Into<String>) -> Self {
        Self {
            base_image: image.into(),
            stage: None,
            state: Arc::new(FsState::default()),
            layers: Arc::from(Vec::new()),
        }
    }

    /// Apply `ops` on top of this snapshot, producing a new one
    pub fn extend(
        &self,
        stage: BuildTarget,
        ops: &[LayerOp],
        ctx: &BuildContext,
        inputs: &AssemblyInputs,
        source: &dyn PackageSource,
    ) -> Result<Snapshot, AssemblyError> {
        let mut state = (*self.state).clone();
        let mut layers = self.layers.to_vec();

        for op in ops {
            trace!("[{stage}] {}", op.describe());
            apply_op(&mut state, op, ctx, inputs, source)?;
            layers.push(LayerRecord {
                stage,
                description: op.describe(),
                digest: format!("sha256:{}", state_digest(&self.base_image, &state)),
            });
        }

        debug!(
            "Stage {stage}: {} layer(s), {} package(s), {} file(s)",
            ops.len(),
            state.packages.len(),
            state.files.len()
        );

        Ok(Snapshot {
            base_image: self.base_image.clone(),
            stage: Some(stage),
            state: Arc::new(state),
            layers: Arc::from(layers),
        })
    }

    pub fn base_image(&self) -> &str {
        &self.base_image
    }

    /// Last stage applied, `None` for a bare base snapshot
    pub fn stage(&self) -> Option<BuildTarget> {
        self.stage
    }

    pub fn file(&self, path: &str) -> Option<&FileEntry> {
        self.state.files.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.state.files.keys().map(String::as_str)
    }

    pub fn packages(&self) -> &ProvisionedEnvironment {
        &self.state.packages
    }

    pub fn timezone(&self) -> Option<&str> {
        self.state.timezone.as_deref()
    }

    pub fn font_cache_built(&self) -> bool {
        self.state.font_cache
    }

    pub fn workdir(&self) -> Option<&str> {
        self.state.workdir.as_deref()
    }

    pub fn entrypoint(&self) -> Option<&Entrypoint> {
        self.state.entrypoint.as_ref()
    }

    pub fn layers(&self) -> &[LayerRecord] {
        &self.layers
    }

    /// Content digest over files, packages and runtime settings
    pub fn digest(&self) -> String {
        format!("sha256:{}", state_digest(&self.base_image, &self.state))
    }

    pub fn manifest(&self) -> SnapshotManifest {
        SnapshotManifest {
            target: self.stage,
            base_image: self.base_image.clone(),
            digest: self.digest(),
            timezone: self.state.timezone.clone(),
            workdir: self.state.workdir.clone(),
            entrypoint: self.state.entrypoint.clone(),
            packages: self.state.packages.iter().map(Package::to_string).collect(),
            files: self.state.files.len(),
            layers: self.layers.to_vec(),
        }
    }

    /// Write every file of the snapshot below `root`
    pub fn export_rootfs(&self, root: &Path) -> Result<usize, AssemblyError> {
        for (path, entry) in &self.state.files {
            let dest = root.join(path.trim_start_matches('/'));
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| AssemblyError::io(parent, e))?;
            }
            fs::write(&dest, &entry.contents).map_err(|e| AssemblyError::io(&dest, e))?;
            set_mode(&dest, entry.mode)?;
        }
        Ok(self.state.files.len())
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), AssemblyError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| AssemblyError::io(path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), AssemblyError> {
    Ok(())
}

fn apply_op(
    state: &mut FsState,
    op: &LayerOp,
    ctx: &BuildContext,
    inputs: &AssemblyInputs,
    source: &dyn PackageSource,
) -> Result<(), AssemblyError> {
    match op {
        LayerOp::AddAptSource {
            name, repository, ..
        } => {
            let line =
                format!("deb [signed-by=/usr/share/keyrings/{name}.gpg] {repository}\n");
            state.files.insert(
                format!("/etc/apt/sources.list.d/{name}.list"),
                FileEntry {
                    contents: line.into_bytes(),
                    mode: 0o644,
                },
            );
        }
        LayerOp::InstallPackages { manager, packages } => {
            require_manager(state, *manager)?;
            let packages: Vec<Package> = packages
                .iter()
                .map(|name| Package::new(*manager, name.clone()))
                .collect();
            install(state, packages, source)?;
        }
        LayerOp::InstallRequirements { from } => {
            require_manager(state, PackageManager::Pip)?;
            let file = ctx
                .get(from)
                .ok_or_else(|| AssemblyError::MissingSource(from.clone()))?;
            let text = String::from_utf8_lossy(&file.contents);
            let packages = parse_requirements(&text)
                .into_iter()
                .map(|name| Package::new(PackageManager::Pip, name))
                .collect();
            install(state, packages, source)?;
        }
        LayerOp::SetTimezone => {
            require_package(state, "timezone configuration", "tzdata")?;
            state.files.insert(
                "/etc/timezone".to_string(),
                FileEntry {
                    contents: format!("{}\n", inputs.timezone).into_bytes(),
                    mode: 0o644,
                },
            );
            state.timezone = Some(inputs.timezone.clone());
        }
        LayerOp::RebuildFontCache => {
            require_package(state, "font cache rebuild", "fontconfig")?;
            state.font_cache = true;
        }
        LayerOp::CopyFile { from, to, mode } => {
            let file = ctx
                .get(from)
                .ok_or_else(|| AssemblyError::MissingSource(from.clone()))?;
            state.files.insert(
                to.clone(),
                FileEntry {
                    contents: file.contents.clone(),
                    mode: mode.unwrap_or(file.mode),
                },
            );
        }
        LayerOp::CopyTree { from, to } => {
            let mut copied = 0usize;
            for (rel, file) in ctx.under(from) {
                state.files.insert(
                    join_image_path(to, rel),
                    FileEntry {
                        contents: file.contents.clone(),
                        mode: file.mode,
                    },
                );
                copied += 1;
            }
            if copied == 0 {
                return Err(AssemblyError::MissingSource(format!("{from}/")));
            }
        }
        LayerOp::SetWorkdir { path } => {
            state.workdir = Some(path.clone());
        }
        LayerOp::SubstituteFile {
            path,
            replacement,
            preserve_as,
        } => {
            let replacement = ctx
                .get(replacement)
                .ok_or_else(|| AssemblyError::MissingSource(replacement.clone()))?;
            if state.files.contains_key(preserve_as) {
                return Err(AssemblyError::SubstitutionConflict {
                    preserve_as: preserve_as.clone(),
                });
            }
            let original = state
                .files
                .remove(path)
                .ok_or_else(|| AssemblyError::Substitution {
                    path: path.clone(),
                    preserve_as: preserve_as.clone(),
                })?;
            state.files.insert(preserve_as.clone(), original);
            state.files.insert(
                path.clone(),
                FileEntry {
                    contents: replacement.contents.clone(),
                    mode: replacement.mode,
                },
            );
        }
        LayerOp::SetEntrypoint { init, command } => {
            if let Some(init_path) = init.first() {
                match state.files.get(init_path) {
                    Some(entry) if entry.is_executable() => {}
                    _ => return Err(AssemblyError::MissingEntrypoint(init_path.clone())),
                }
            }
            if let Some(script) = command.last()
                && command.len() > 1
            {
                match state.files.get(script) {
                    Some(entry) if entry.is_executable() => {}
                    Some(_) => return Err(AssemblyError::EntrypointNotExecutable(script.clone())),
                    None => return Err(AssemblyError::MissingEntrypoint(script.clone())),
                }
            }
            state.entrypoint = Some(Entrypoint {
                init: init.clone(),
                command: command.clone(),
            });
        }
    }
    Ok(())
}

fn install(
    state: &mut FsState,
    packages: Vec<Package>,
    source: &dyn PackageSource,
) -> Result<(), AssemblyError> {
    // All-or-nothing: check every package before recording any
    if let Some(missing) = packages.iter().find(|p| !source.is_available(p)) {
        return Err(AssemblyError::PackageUnavailable(missing.clone()));
    }
    state.packages.extend(packages);
    Ok(())
}

fn require_manager(state: &FsState, manager: PackageManager) -> Result<(), AssemblyError> {
    match manager {
        PackageManager::Apt => Ok(()),
        PackageManager::Npm => require_package(state, "npm install", "npm"),
        PackageManager::Pip => require_package(state, "pip install", "python3-pip"),
    }
}

fn require_package(state: &FsState, step: &str, apt_name: &str) -> Result<(), AssemblyError> {
    if state
        .packages
        .contains(&Package::new(PackageManager::Apt, apt_name))
    {
        Ok(())
    } else {
        Err(AssemblyError::Provisioning {
            step: step.to_string(),
            requirement: format!("apt:{apt_name}"),
        })
    }
}

fn state_digest(base_image: &str, state: &FsState) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"base\0");
    hasher.update(base_image.as_bytes());
    for (path, entry) in &state.files {
        hasher.update(b"\0file\0");
        hasher.update(path.as_bytes());
        hasher.update(format!("\0{:o}\0{}\0", entry.mode, entry.contents.len()).as_bytes());
        hasher.update(&entry.contents);
    }
    for package in &state.packages {
        hasher.update(b"\0pkg\0");
        hasher.update(package.to_string().as_bytes());
    }
    if let Some(tz) = &state.timezone {
        hasher.update(b"\0tz\0");
        hasher.update(tz.as_bytes());
    }
    hasher.update(if state.font_cache { b"\0fc\x01" } else { b"\0fc\x00" });
    if let Some(workdir) = &state.workdir {
        hasher.update(b"\0wd\0");
        hasher.update(workdir.as_bytes());
    }
    if let Some(entrypoint) = &state.entrypoint {
        hasher.update(b"\0ep\0");
        for arg in entrypoint.init.iter().chain(&entrypoint.command) {
            hasher.update(arg.as_bytes());
            hasher.update(b"\0");
        }
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::manifest::OpenPackageSource;

    fn inputs() -> AssemblyInputs {
        AssemblyInputs {
            timezone: "Etc/UTC".to_string(),
        }
    }

    fn apt(names: &[&str]) -> LayerOp {
        LayerOp::InstallPackages {
            manager: PackageManager::Apt,
            packages: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn extend_leaves_receiver_untouched() {
        let base = Snapshot::base("ubuntu:22.04");
        let ctx = BuildContext::new();
        let next = base
            .extend(
                BuildTarget::Production,
                &[apt(&["tzdata"]), LayerOp::SetTimezone],
                &ctx,
                &inputs(),
                &OpenPackageSource,
            )
            .unwrap();

        assert!(base.packages().is_empty());
        assert!(base.layers().is_empty());
        assert_eq!(next.layers().len(), 2);
        assert_eq!(next.timezone(), Some("Etc/UTC"));
        assert_ne!(base.digest(), next.digest());
    }

    #[test]
    fn timezone_requires_tzdata() {
        let err = Snapshot::base("ubuntu:22.04")
            .extend(
                BuildTarget::Production,
                &[LayerOp::SetTimezone],
                &BuildContext::new(),
                &inputs(),
                &OpenPackageSource,
            )
            .unwrap_err();
        assert!(matches!(err, AssemblyError::Provisioning { .. }));
    }

    #[test]
    fn substitution_without_original_fails() {
        let mut ctx = BuildContext::new();
        ctx.insert("agent/wptagent_debug.py", "debug", 0o644);
        let err = Snapshot::base("ubuntu:22.04")
            .extend(
                BuildTarget::Debug,
                &[LayerOp::SubstituteFile {
                    path: "/wptagent/wptagent.py".to_string(),
                    replacement: "agent/wptagent_debug.py".to_string(),
                    preserve_as: "/wptagent/wptagent_starter.py".to_string(),
                }],
                &ctx,
                &inputs(),
                &OpenPackageSource,
            )
            .unwrap_err();
        assert!(matches!(err, AssemblyError::Substitution { .. }));
    }

    #[test]
    fn entrypoint_requires_executable_init() {
        let mut ctx = BuildContext::new();
        ctx.insert("init/wpt-init", "bin", 0o644);
        ctx.insert("agent/entrypoint.sh", "#!/bin/bash", 0o755);
        let err = Snapshot::base("ubuntu:22.04")
            .extend(
                BuildTarget::Production,
                &[
                    LayerOp::CopyFile {
                        from: "init/wpt-init".to_string(),
                        to: "/usr/local/bin/wpt-init".to_string(),
                        mode: None,
                    },
                    LayerOp::CopyTree {
                        from: "agent".to_string(),
                        to: "/wptagent".to_string(),
                    },
                    LayerOp::SetEntrypoint {
                        init: vec!["/usr/local/bin/wpt-init".to_string(), "--".to_string()],
                        command: vec![
                            "/bin/bash".to_string(),
                            "/wptagent/entrypoint.sh".to_string(),
                        ],
                    },
                ],
                &ctx,
                &inputs(),
                &OpenPackageSource,
            )
            .unwrap_err();
        assert!(matches!(err, AssemblyError::MissingEntrypoint(p) if p == "/usr/local/bin/wpt-init"));
    }

    #[test]
    fn export_writes_files_with_modes() {
        let mut ctx = BuildContext::new();
        ctx.insert("agent/run.sh", "#!/bin/sh\n", 0o755);
        let snap = Snapshot::base("ubuntu:22.04")
            .extend(
                BuildTarget::Production,
                &[LayerOp::CopyTree {
                    from: "agent".to_string(),
                    to: "/wptagent".to_string(),
                }],
                &ctx,
                &inputs(),
                &OpenPackageSource,
            )
            .unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(snap.export_rootfs(dir.path()).unwrap(), 1);
        let written = dir.path().join("wptagent/run.sh");
        assert_eq!(fs::read_to_string(&written).unwrap(), "#!/bin/sh\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&written).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o755);
        }
    }
}
