//! Config file locations
//!
//! `WPT_IMAGE_CONFIG` overrides the config file path; otherwise the
//! platform config directory is used (`~/.config/wptagent-image` on Linux).

use directories::ProjectDirs;
use std::path::PathBuf;

/// Environment variable overriding the config file path
pub const CONFIG_PATH_ENV: &str = "WPT_IMAGE_CONFIG";

const CONFIG_FILE_NAME: &str = "config.json";

/// Directory holding the config file
pub fn get_config_dir() -> Option<PathBuf> {
    if let Some(path) = env_override() {
        return path.parent().map(PathBuf::from);
    }
    ProjectDirs::from("", "", "wptagent-image").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Full path of the config file
pub fn get_config_path() -> Option<PathBuf> {
    if let Some(path) = env_override() {
        return Some(path);
    }
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

fn env_override() -> Option<PathBuf> {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_override_wins() {
        // SAFETY: serialised with the other env-mutating tests
        unsafe { std::env::set_var(CONFIG_PATH_ENV, "/tmp/wpt/custom.json") };
        assert_eq!(
            get_config_path(),
            Some(PathBuf::from("/tmp/wpt/custom.json"))
        );
        assert_eq!(get_config_dir(), Some(PathBuf::from("/tmp/wpt")));
        unsafe { std::env::remove_var(CONFIG_PATH_ENV) };
    }

    #[test]
    #[serial]
    fn default_path_ends_with_config_json() {
        unsafe { std::env::remove_var(CONFIG_PATH_ENV) };
        if let Some(path) = get_config_path() {
            assert!(path.ends_with(CONFIG_FILE_NAME));
        }
    }
}
