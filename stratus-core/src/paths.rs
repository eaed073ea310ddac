//! Centralized path configuration for stratus.
//!
//! All per-user paths go through this module so the CLI and tests agree on
//! where local state lives.

use std::path::{Path, PathBuf};

/// Name of the per-user configuration directory under the home directory.
pub const CONFIG_DIR_NAME: &str = ".stratus";

/// Name of the project configuration file.
pub const PROJECT_CONFIG_FILE: &str = "stratus.json";

/// Resolve the home directory used for per-user state.
///
/// Resolution order:
/// 1. `STRATUS_HOME` environment variable
/// 2. the platform home directory
/// 3. the current directory
pub fn home_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("STRATUS_HOME") {
        return PathBuf::from(dir);
    }

    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Per-user configuration directory (`~/.stratus`).
pub fn config_dir(home: &Path) -> PathBuf {
    home.join(CONFIG_DIR_NAME)
}

/// Root of the local state backend (`~/.stratus/state`).
pub fn local_state_dir(home: &Path) -> PathBuf {
    config_dir(home).join("state")
}

/// Project configuration file inside a project directory.
pub fn project_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_consistency() {
        let home = PathBuf::from("/home/dev");
        let base = config_dir(&home);
        assert_eq!(base, PathBuf::from("/home/dev/.stratus"));
        assert!(local_state_dir(&home).starts_with(&base));
    }

    #[test]
    fn test_project_config_path() {
        assert_eq!(
            project_config_path(Path::new("/work/site")),
            PathBuf::from("/work/site/stratus.json")
        );
    }
}
