//! Build target selection
//!
//! An image is built for exactly one target. `Debug` only ever extends
//! `Production`, so resolving the target is the only decision the assembler
//! makes about which agent script ends up at the entrypoint path.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named build variants
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BuildTarget {
    /// The agent script as shipped
    Production,
    /// Production plus debug tooling and the instrumented agent script
    Debug,
}

/// Target used when neither the command line nor the config selects one.
pub const DEFAULT_BUILD_TARGET: BuildTarget = BuildTarget::Production;

impl BuildTarget {
    /// Stage name used in the rendered Dockerfile and passed as the build target
    pub fn stage_name(self) -> &'static str {
        match self {
            BuildTarget::Production => "production",
            BuildTarget::Debug => "debug",
        }
    }

    /// Tag suffix appended to the configured image tag
    pub fn tag_suffix(self) -> &'static str {
        match self {
            BuildTarget::Production => "",
            BuildTarget::Debug => "-debug",
        }
    }

    /// Every target, in stage order
    pub fn all() -> [BuildTarget; 2] {
        [BuildTarget::Production, BuildTarget::Debug]
    }
}

impl Default for BuildTarget {
    fn default() -> Self {
        DEFAULT_BUILD_TARGET
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stage_name())
    }
}

impl FromStr for BuildTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(BuildTarget::Production),
            "debug" => Ok(BuildTarget::Debug),
            other => Err(format!(
                "unknown build target '{other}' (expected 'production' or 'debug')"
            )),
        }
    }
}

/// Resolve the effective target.
///
/// Resolution order:
/// 1. Explicit request (e.g. `--target`)
/// 2. Configured default
/// 3. [`DEFAULT_BUILD_TARGET`]
pub fn resolve_target(
    requested: Option<BuildTarget>,
    configured_default: Option<BuildTarget>,
) -> BuildTarget {
    requested
        .or(configured_default)
        .unwrap_or(DEFAULT_BUILD_TARGET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unselected_target_resolves_to_production() {
        assert_eq!(resolve_target(None, None), BuildTarget::Production);
        assert_eq!(BuildTarget::default(), BuildTarget::Production);
    }

    #[test]
    fn explicit_request_wins_over_config() {
        assert_eq!(
            resolve_target(Some(BuildTarget::Production), Some(BuildTarget::Debug)),
            BuildTarget::Production
        );
        assert_eq!(
            resolve_target(None, Some(BuildTarget::Debug)),
            BuildTarget::Debug
        );
    }

    #[test]
    fn parses_stage_names() {
        assert_eq!("debug".parse::<BuildTarget>(), Ok(BuildTarget::Debug));
        assert_eq!(" Production ".parse::<BuildTarget>(), Ok(BuildTarget::Production));
        assert!("release".parse::<BuildTarget>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&BuildTarget::Debug).unwrap();
        assert_eq!(json, "\"debug\"");
    }
}
