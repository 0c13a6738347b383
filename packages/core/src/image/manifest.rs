//! Provisioning manifest
//!
//! The agent performs no dependency checks of its own, so the image has to
//! carry the full set below before the entrypoint is declared. Installation
//! itself is opaque: the assembler only records which packages a layer adds
//! and asks a [`PackageSource`] whether they can be installed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Package manager responsible for installing a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Apt,
    Npm,
    Pip,
}

impl PackageManager {
    pub fn as_str(self) -> &'static str {
        match self {
            PackageManager::Apt => "apt",
            PackageManager::Npm => "npm",
            PackageManager::Pip => "pip",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single installable package
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Package {
    pub manager: PackageManager,
    pub name: String,
}

impl Package {
    pub fn new(manager: PackageManager, name: impl Into<String>) -> Self {
        Self {
            manager,
            name: name.into(),
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.manager, self.name)
    }
}

/// Installed package set of a snapshot (order-independent)
pub type ProvisionedEnvironment = BTreeSet<Package>;

/// Source of installable packages
///
/// Assembly asks the source before recording an install; an unavailable
/// package is a fatal provisioning failure.
pub trait PackageSource {
    fn is_available(&self, package: &Package) -> bool;
}

/// Package source that accepts every package
///
/// Used for offline assembly where availability is only known to the real
/// image build.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenPackageSource;

impl PackageSource for OpenPackageSource {
    fn is_available(&self, _package: &Package) -> bool {
        true
    }
}

/// Package source backed by an explicit catalog
#[derive(Debug, Clone, Default)]
pub struct CatalogPackageSource {
    packages: HashSet<Package>,
}

impl CatalogPackageSource {
    pub fn new(packages: impl IntoIterator<Item = Package>) -> Self {
        Self {
            packages: packages.into_iter().collect(),
        }
    }

    /// Remove a package from the catalog, returning whether it was present
    pub fn withdraw(&mut self, package: &Package) -> bool {
        self.packages.remove(package)
    }
}

impl PackageSource for CatalogPackageSource {
    fn is_available(&self, package: &Package) -> bool {
        self.packages.contains(package)
    }
}

/// Debug-support package added by the debug stage
pub const DEBUG_SUPPORT_PACKAGE: &str = "debugpy";

/// Apt packages the agent expects at runtime
pub const DEFAULT_APT_PACKAGES: &[&str] = &[
    "python3",
    "python3-pip",
    "python3-ujson",
    "python3-numpy",
    "python3-scipy",
    "python3-dev",
    "python3-tk",
    "imagemagick",
    "dbus-x11",
    "traceroute",
    "software-properties-common",
    "psmisc",
    "libnss3-tools",
    "iproute2",
    "net-tools",
    "openvpn",
    "libtiff5-dev",
    "libjpeg-dev",
    "zlib1g-dev",
    "libfreetype6-dev",
    "liblcms2-dev",
    "libwebp-dev",
    "tcl8.6-dev",
    "tk8.6-dev",
    "ffmpeg",
    "nodejs",
    "npm",
    "git",
    "curl",
    "wget",
    "gnupg",
    "sudo",
    "tzdata",
    "xvfb",
    "fontconfig",
    "fonts-noto",
    "fonts-noto-cjk",
    "fonts-noto-color-emoji",
    "fonts-roboto",
    "fonts-open-sans",
    "fonts-liberation",
];

/// Browser installed from its vendor repository
pub const DEFAULT_BROWSER_PACKAGE: &str = "google-chrome-stable";

/// Node-based tooling installed globally
pub const DEFAULT_NPM_PACKAGES: &[&str] = &["lighthouse"];

/// Expand a list of names into packages for one manager
pub fn packages_for(manager: PackageManager, names: &[String]) -> Vec<Package> {
    names
        .iter()
        .map(|name| Package::new(manager, name.clone()))
        .collect()
}
