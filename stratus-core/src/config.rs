//! Project configuration management.

use crate::build::Framework;
use crate::error::{Result, StratusError};
use crate::paths;
use crate::types::BackendPreference;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of `stratus.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectConfig {
    pub name: Option<String>,
    pub framework: Option<Framework>,
    pub region: Option<String>,
    pub backend: Option<String>,
    pub program_dir: String,
    pub build_command: Option<String>,
    pub output_dir: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: None,
            framework: None,
            region: None,
            backend: None,
            program_dir: "infra".to_string(),
            build_command: None,
            output_dir: None,
        }
    }
}

impl ProjectConfig {
    /// Load configuration from a project directory; a missing file yields defaults.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = paths::project_config_path(project_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| StratusError::IoError { path: path.clone(), source: e })?;
        serde_json::from_str(&content).map_err(|e| StratusError::InvalidConfig {
            reason: format!("Failed to parse {}: {}", path.display(), e),
        })
    }
}

/// A project with every setting resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub dir: PathBuf,
    pub name: String,
    pub framework: Option<Framework>,
    pub region: Option<String>,
    pub backend: Option<BackendPreference>,
    pub program_dir: PathBuf,
    pub build_command: Option<String>,
    pub output_dir: Option<PathBuf>,
}

impl Project {
    /// Load and resolve the project rooted at `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let config = ProjectConfig::load(dir)?;
        Self::resolve(dir, config)
    }

    pub fn resolve(dir: &Path, config: ProjectConfig) -> Result<Self> {
        let package = read_package_json(dir)?;

        let raw_name = config
            .name
            .clone()
            .or_else(|| {
                package
                    .as_ref()
                    .and_then(|p| p.get("name"))
                    .and_then(|n| n.as_str())
                    .map(String::from)
            })
            .or_else(|| dir.file_name().and_then(|n| n.to_str()).map(String::from))
            .unwrap_or_else(|| "app".to_string());
        let name = sanitize_name(&raw_name);
        if name.is_empty() {
            return Err(StratusError::InvalidConfig {
                reason: format!("cannot derive a project name from '{}'", raw_name),
            });
        }

        let framework = config.framework.or_else(|| package.as_ref().and_then(Framework::detect));
        let backend: Option<BackendPreference> =
            config.backend.as_deref().map(str::parse).transpose()?;

        Ok(Self {
            dir: dir.to_path_buf(),
            name,
            framework,
            region: config.region,
            backend,
            program_dir: dir.join(&config.program_dir),
            build_command: config.build_command,
            output_dir: config.output_dir.map(|o| dir.join(o)),
        })
    }

    /// Directory whose presence means a prior build exists.
    pub fn expected_output_dir(&self) -> Option<PathBuf> {
        self.output_dir
            .clone()
            .or_else(|| self.framework.map(|f| self.dir.join(f.output_dir())))
    }

    /// Build command from the project or the framework default.
    pub fn default_build_command(&self) -> Option<String> {
        self.build_command
            .clone()
            .or_else(|| self.framework.map(|f| f.default_build_command().to_string()))
    }
}

fn read_package_json(dir: &Path) -> Result<Option<serde_json::Value>> {
    let path = dir.join("package.json");
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| StratusError::IoError { path: path.clone(), source: e })?;
    serde_json::from_str(&content).map(Some).map_err(|e| StratusError::InvalidConfig {
        reason: format!("Failed to parse {}: {}", path.display(), e),
    })
}

/// Lowercase `[a-z0-9-]` form of a name, safe for bucket names and URLs.
///
/// npm scopes (`@acme/site`) keep only the package part.
pub fn sanitize_name(raw: &str) -> String {
    let base = raw.rsplit('/').next().unwrap_or(raw);
    let mut out = String::with_capacity(base.len());
    for c in base.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("My Site"), "my-site");
        assert_eq!(sanitize_name("@acme/web_app"), "web-app");
        assert_eq!(sanitize_name("--x--"), "x");
        assert_eq!(sanitize_name("__"), "");
    }

    #[test]
    fn test_missing_config_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.program_dir, "infra");
    }

    #[test]
    fn test_project_from_package_json() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name": "@acme/shop", "dependencies": {"next": "14.2.0"}}"#,
        )
        .unwrap();

        let project = Project::load(dir.path()).unwrap();
        assert_eq!(project.name, "shop");
        assert_eq!(project.framework, Some(Framework::NextJs));
        assert_eq!(project.expected_output_dir(), Some(dir.path().join(".open-next")));
        assert_eq!(project.program_dir, dir.path().join("infra"));
    }

    #[test]
    fn test_config_overrides() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("stratus.json"),
            r#"{"name": "Docs", "framework": "sveltekit", "backend": "local",
                "buildCommand": "pnpm build", "outputDir": "dist", "region": "eu-west-1"}"#,
        )
        .unwrap();

        let project = Project::load(dir.path()).unwrap();
        assert_eq!(project.name, "docs");
        assert_eq!(project.framework, Some(Framework::SvelteKit));
        assert_eq!(project.backend, Some(BackendPreference::Local));
        assert_eq!(project.default_build_command().as_deref(), Some("pnpm build"));
        assert_eq!(project.expected_output_dir(), Some(dir.path().join("dist")));
        assert_eq!(project.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_invalid_backend_in_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("stratus.json"), r#"{"backend": "gcs"}"#).unwrap();
        let err = Project::load(dir.path()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_malformed_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("stratus.json"), "{ not json").unwrap();
        assert!(matches!(
            ProjectConfig::load(dir.path()),
            Err(StratusError::InvalidConfig { .. })
        ));
    }
}
