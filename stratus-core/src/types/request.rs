//! Deployment request types.

use crate::error::{Result, StratusError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operation performed against the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    /// Dry-run diff, no mutation.
    Preview,
    /// Provision or update resources.
    #[default]
    Apply,
    /// Tear down every managed resource.
    Destroy,
}

impl OperationMode {
    /// Whether the operation removes infrastructure.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Destroy)
    }

    /// Verb used in progress lines ("Deploying", ...).
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Preview => "Previewing",
            Self::Apply => "Deploying",
            Self::Destroy => "Destroying",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Apply => "up",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the caller wants stack state kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    Local,
    Remote,
    #[default]
    Auto,
}

impl FromStr for BackendPreference {
    type Err = StratusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            "auto" => Ok(Self::Auto),
            other => Err(StratusError::InvalidConfig {
                reason: format!("unknown backend '{}', expected local, remote or auto", other),
            }),
        }
    }
}

/// Build-control flags from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildFlags {
    /// Force a build.
    pub build: bool,
    /// Never build; wins over `build`.
    pub skip_build: bool,
    /// Explicit build command override.
    pub build_command: Option<String>,
}

/// Immutable input for one CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub stack: String,
    pub mode: OperationMode,
    pub verbose: bool,
    pub debug: bool,
    pub build: BuildFlags,
    pub backend: BackendPreference,
}

impl DeploymentRequest {
    pub fn new(stack: impl Into<String>, mode: OperationMode) -> Self {
        Self {
            stack: stack.into(),
            mode,
            verbose: false,
            debug: false,
            build: BuildFlags::default(),
            backend: BackendPreference::Auto,
        }
    }

    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_build(mut self, build: BuildFlags) -> Self {
        self.build = build;
        self
    }

    /// `debug` implies `verbose`.
    pub fn with_verbosity(mut self, verbose: bool, debug: bool) -> Self {
        self.verbose = verbose || debug;
        self.debug = debug;
        self
    }

    /// Check the request before anything touches the backend.
    pub fn validate(&self) -> Result<()> {
        if self.stack.trim().is_empty() {
            return Err(StratusError::InvalidConfig { reason: "stack name is required".into() });
        }
        if !self.stack.chars().all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c)) {
            return Err(StratusError::InvalidConfig {
                reason: format!(
                    "stack name '{}' may only contain letters, digits, '-', '_' and '.'",
                    self.stack
                ),
            });
        }
        Ok(())
    }
}
