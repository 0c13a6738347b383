//! Configuration schema for wptagent-image
//!
//! Defines the structure and defaults for the config.json file.

use crate::image::manifest::{
    DEBUG_SUPPORT_PACKAGE, DEFAULT_APT_PACKAGES, DEFAULT_BROWSER_PACKAGE, DEFAULT_NPM_PACKAGES,
};
use crate::image::target::{BuildTarget, DEFAULT_BUILD_TARGET};
use serde::{Deserialize, Serialize};

/// Main configuration structure for wptagent-image
///
/// Serialized to/from `~/.config/wptagent-image/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Config file version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Local image repository (default: "wptagent")
    #[serde(default = "default_image_name")]
    pub image_name: String,

    /// Base tag; debug builds append "-debug" (default: "latest")
    #[serde(default = "default_image_tag")]
    pub image_tag: String,

    /// Target built when no `--target` is given (default: "production")
    #[serde(default = "default_target")]
    pub default_target: BuildTarget,

    /// Timezone identifier applied during provisioning (default: "Etc/UTC")
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Base image of the production stage (default: "ubuntu:22.04")
    #[serde(default = "default_base_image")]
    pub base_image: String,

    /// Directory the agent source tree is copied to (default: "/wptagent")
    #[serde(default = "default_agent_root")]
    pub agent_root: String,

    /// Shell script run by the init process, relative to `agent_root`
    #[serde(default = "default_entrypoint_script")]
    pub entrypoint_script: String,

    /// Shell used to run the entrypoint script (default: "/bin/bash")
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Python requirements manifest, relative to the agent source tree
    #[serde(default = "default_requirements_file")]
    pub requirements_file: String,

    /// System packages installed with apt
    #[serde(default = "default_apt_packages")]
    pub apt_packages: Vec<String>,

    /// Browser package installed from the vendor apt repository
    #[serde(default = "default_browser_package")]
    pub browser_package: String,

    /// Node tooling installed globally with npm
    #[serde(default = "default_npm_packages")]
    pub npm_packages: Vec<String>,

    /// Python package added by the debug stage (default: "debugpy")
    #[serde(default = "default_debug_package")]
    pub debug_package: String,

    /// Install path of the init supervisor inside the image
    #[serde(default = "default_init_path")]
    pub init_path: String,

    /// Signals the init process forwards to the agent process group
    #[serde(default = "default_forward_signals")]
    pub forward_signals: Vec<String>,
}

fn default_version() -> u32 {
    1
}

fn default_image_name() -> String {
    "wptagent".to_string()
}

fn default_image_tag() -> String {
    "latest".to_string()
}

fn default_target() -> BuildTarget {
    DEFAULT_BUILD_TARGET
}

fn default_timezone() -> String {
    "Etc/UTC".to_string()
}

fn default_base_image() -> String {
    "ubuntu:22.04".to_string()
}

fn default_agent_root() -> String {
    "/wptagent".to_string()
}

fn default_entrypoint_script() -> String {
    "docker/linux-headless/entrypoint.sh".to_string()
}

fn default_shell() -> String {
    "/bin/bash".to_string()
}

fn default_requirements_file() -> String {
    ".github/workflows/requirements.txt".to_string()
}

fn default_apt_packages() -> Vec<String> {
    DEFAULT_APT_PACKAGES.iter().map(|s| s.to_string()).collect()
}

fn default_browser_package() -> String {
    DEFAULT_BROWSER_PACKAGE.to_string()
}

fn default_npm_packages() -> Vec<String> {
    DEFAULT_NPM_PACKAGES.iter().map(|s| s.to_string()).collect()
}

fn default_debug_package() -> String {
    DEBUG_SUPPORT_PACKAGE.to_string()
}

fn default_init_path() -> String {
    "/usr/local/bin/wpt-init".to_string()
}

pub(crate) fn default_forward_signals() -> Vec<String> {
    ["HUP", "INT", "QUIT", "TERM", "USR1", "USR2", "WINCH"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            image_name: default_image_name(),
            image_tag: default_image_tag(),
            default_target: default_target(),
            timezone: default_timezone(),
            base_image: default_base_image(),
            agent_root: default_agent_root(),
            entrypoint_script: default_entrypoint_script(),
            shell: default_shell(),
            requirements_file: default_requirements_file(),
            apt_packages: default_apt_packages(),
            browser_package: default_browser_package(),
            npm_packages: default_npm_packages(),
            debug_package: default_debug_package(),
            init_path: default_init_path(),
            forward_signals: default_forward_signals(),
        }
    }
}

impl Config {
    /// Create a new Config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute path of the active agent script inside the image
    pub fn agent_script_path(&self) -> String {
        join_image_path(&self.agent_root, crate::image::plan::AGENT_SCRIPT)
    }

    /// Absolute path of the shell entrypoint script inside the image
    pub fn entrypoint_script_path(&self) -> String {
        join_image_path(&self.agent_root, &self.entrypoint_script)
    }

    /// Full image reference for a target, e.g. `wptagent:latest-debug`
    pub fn image_reference(&self, target: BuildTarget, tag: Option<&str>) -> String {
        let tag = tag.unwrap_or(&self.image_tag);
        format!("{}:{}{}", self.image_name, tag, target.tag_suffix())
    }
}

/// Join an absolute image directory with a relative path
pub fn join_image_path(dir: &str, relative: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let relative = relative.trim_start_matches("./").trim_start_matches('/');
    if dir.is_empty() {
        format!("/{relative}")
    } else {
        format!("{dir}/{relative}")
    }
}
