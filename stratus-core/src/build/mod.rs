//! Build step: deciding whether to build, and running the build command.

mod framework;

pub use framework::Framework;

use crate::error::{Result, StratusError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Decide whether a build must run before provisioning.
///
/// `skip_build` wins, then `build`; otherwise build only when the expected
/// output directory is absent. Presence is taken as a valid prior build.
pub fn should_build(build: bool, skip_build: bool, expected_output: Option<&Path>) -> bool {
    if skip_build {
        return false;
    }
    if build {
        return true;
    }
    match expected_output {
        Some(dir) => !dir.exists(),
        None => true,
    }
}

/// Runs a framework build.
#[async_trait]
pub trait BuildRunner: Send + Sync {
    /// Run `command` in `dir`. Output is streamed when `verbose`, captured otherwise.
    async fn run_build(&self, command: &str, dir: &Path, verbose: bool) -> Result<()>;
}

/// Runs build commands through `sh -c`.
#[derive(Debug, Clone, Default)]
pub struct ShellBuildRunner;

#[async_trait]
impl BuildRunner for ShellBuildRunner {
    #[instrument(skip(self, dir))]
    async fn run_build(&self, command: &str, dir: &Path, verbose: bool) -> Result<()> {
        info!("Running build in {}", dir.display());

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).current_dir(dir).stdin(Stdio::null());

        if verbose {
            let status = cmd
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map_err(|e| build_error(command, format!("failed to spawn: {}", e), None))?;

            if !status.success() {
                return Err(build_error(command, exit_reason(status), None));
            }
        } else {
            let output = cmd
                .output()
                .await
                .map_err(|e| build_error(command, format!("failed to spawn: {}", e), None))?;

            if !output.status.success() {
                let mut captured = String::from_utf8_lossy(&output.stdout).to_string();
                captured.push_str(&String::from_utf8_lossy(&output.stderr));
                return Err(build_error(command, exit_reason(output.status), Some(captured)));
            }
        }

        debug!("Build finished");
        Ok(())
    }
}

fn build_error(command: &str, reason: String, output: Option<String>) -> StratusError {
    StratusError::Build { command: command.to_string(), reason, output }
}

fn exit_reason(status: std::process::ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with status {}", code),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_skip_build_always_wins() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("build");
        assert!(!should_build(false, true, Some(dir.path())));
        assert!(!should_build(false, true, Some(&missing)));
        assert!(!should_build(true, true, Some(&missing)));
        assert!(!should_build(true, true, None));
    }

    #[test]
    fn test_explicit_build_forces() {
        let dir = TempDir::new().unwrap();
        assert!(should_build(true, false, Some(dir.path())));
        assert!(should_build(true, false, Some(&dir.path().join("missing"))));
    }

    #[test]
    fn test_output_dir_presence() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join(".open-next");
        assert!(should_build(false, false, Some(&output)));

        std::fs::create_dir(&output).unwrap();
        assert!(!should_build(false, false, Some(&output)));
    }

    #[test]
    fn test_unknown_output_dir_builds() {
        assert!(should_build(false, false, None));
    }

    #[tokio::test]
    async fn test_shell_build_success() {
        let dir = TempDir::new().unwrap();
        ShellBuildRunner.run_build("mkdir out", dir.path(), false).await.unwrap();
        assert!(dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_shell_build_failure_captures_output() {
        let dir = TempDir::new().unwrap();
        let err = ShellBuildRunner
            .run_build("echo compiling; echo boom >&2; exit 3", dir.path(), false)
            .await
            .unwrap_err();

        match &err {
            StratusError::Build { reason, output, .. } => {
                assert_eq!(reason, "exited with status 3");
                let output = output.as_deref().unwrap();
                assert!(output.contains("compiling"));
                assert!(output.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.kind(), crate::error::ErrorKind::Build);
    }
}
