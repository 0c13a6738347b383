//! Build context: the files an image build may copy from
//!
//! Context layout:
//! - `agent/...`    the wptagent source tree (agent scripts, requirements, entrypoint)
//! - `init/wpt-init` the init supervisor binary
//!
//! The same context feeds the offline snapshot assembly and the tarball sent
//! to the Docker daemon, so both see identical inputs.

use super::error::AssemblyError;
use super::plan::STARTER_SCRIPT;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Context directory holding the agent source tree
pub const CONTEXT_AGENT_DIR: &str = "agent";

/// Context path of the init supervisor binary
pub const CONTEXT_INIT_BINARY: &str = "init/wpt-init";

/// Directory names never copied from the source tree
const SKIPPED_DIRS: &[&str] = &[".git", "__pycache__", "node_modules"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFile {
    pub contents: Vec<u8>,
    pub mode: u32,
}

/// In-memory build context keyed by `/`-separated relative paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildContext {
    files: BTreeMap<String, ContextFile>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the agent source tree and, when given, the init binary
    pub fn from_source_dir(
        source_dir: &Path,
        init_binary: Option<&Path>,
    ) -> Result<Self, AssemblyError> {
        let mut context = Self::new();
        if !source_dir.is_dir() {
            return Err(AssemblyError::MissingSource(format!(
                "source directory {}",
                source_dir.display()
            )));
        }
        context.load_dir(source_dir, CONTEXT_AGENT_DIR)?;
        debug!(
            "Loaded {} file(s) from {}",
            context.files.len(),
            source_dir.display()
        );

        if let Some(init_binary) = init_binary {
            let contents =
                fs::read(init_binary).map_err(|e| AssemblyError::io(init_binary, e))?;
            context.insert(CONTEXT_INIT_BINARY, contents, 0o755);
        }
        Ok(context)
    }

    fn load_dir(&mut self, dir: &Path, prefix: &str) -> Result<(), AssemblyError> {
        let entries = fs::read_dir(dir).map_err(|e| AssemblyError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| AssemblyError::io(dir, e))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let rel = format!("{prefix}/{name}");
            let file_type = entry.file_type().map_err(|e| AssemblyError::io(&path, e))?;

            if file_type.is_dir() {
                if SKIPPED_DIRS.contains(&name.as_str()) {
                    continue;
                }
                self.load_dir(&path, &rel)?;
                continue;
            }

            // Symlinks are followed only when they point at regular files
            let metadata = fs::metadata(&path).map_err(|e| AssemblyError::io(&path, e))?;
            if !metadata.is_file() {
                continue;
            }
            // Only debug images carry the preserved starter script
            if prefix == CONTEXT_AGENT_DIR && name == STARTER_SCRIPT {
                warn!("Ignoring {} in the source tree", path.display());
                continue;
            }
            let contents = fs::read(&path).map_err(|e| AssemblyError::io(&path, e))?;
            self.insert(&rel, contents, file_mode(&metadata));
        }
        Ok(())
    }

    pub fn insert(&mut self, path: &str, contents: impl Into<Vec<u8>>, mode: u32) {
        self.files.insert(
            path.trim_start_matches('/').to_string(),
            ContextFile {
                contents: contents.into(),
                mode: mode & 0o7777,
            },
        );
    }

    pub fn get(&self, path: &str) -> Option<&ContextFile> {
        self.files.get(path.trim_start_matches('/'))
    }

    /// Files below `dir`, yielded with paths relative to it
    pub fn under<'a>(&'a self, dir: &str) -> impl Iterator<Item = (&'a str, &'a ContextFile)> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.files
            .iter()
            .filter_map(move |(path, file)| {
                path.strip_prefix(prefix.as_str()).map(|rel| (rel, file))
            })
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &ContextFile)> {
        self.files.iter().map(|(path, file)| (path.as_str(), file))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Parse package names out of a pip requirements file
///
/// Comments, blank lines and option lines (`-r`, `--index-url`, ...) are
/// skipped; version specifiers, extras and markers are dropped.
pub fn parse_requirements(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty() && !line.starts_with('-'))
        .filter_map(|line| {
            let end = line
                .find(|c: char| matches!(c, '=' | '<' | '>' | '!' | '~' | ';' | '[' | ' ' | '@'))
                .unwrap_or(line.len());
            let name = line[..end].trim();
            (!name.is_empty()).then(|| name.to_ascii_lowercase())
        })
        .collect()
}
