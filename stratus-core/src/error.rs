//! Error types for stratus.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.
//! Every failure carries a machine-checkable [`ErrorKind`]; the retry paths
//! branch on the kind, never on message text.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stratus operations.
pub type Result<T> = std::result::Result<T, StratusError>;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// State backend could not be verified or created.
    Backend,
    /// The framework build failed.
    Build,
    /// The stack is held by another operation.
    Lock,
    /// Any other provisioning engine failure.
    Provisioning,
    /// Bad flags, project config or environment.
    Config,
    /// Local bugs and I/O trouble.
    Internal,
}

/// Main error type for stratus.
#[derive(Error, Debug)]
pub enum StratusError {
    // Backend errors
    #[error("State backend {location} is unavailable: {reason}")]
    Backend { location: String, reason: String },

    // Build errors
    #[error("Build command `{command}` failed: {reason}")]
    Build { command: String, reason: String, output: Option<String> },

    // Engine errors
    #[error("Stack '{stack}' is locked by another operation, try again later")]
    StackLocked { stack: String, operation: String, detail: String },

    #[error("{operation} failed: {message}")]
    Provisioning { operation: String, message: String, detail: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error(
        "No secrets passphrase configured. Set STRATUS_CONFIG_PASSPHRASE (or \
         PULUMI_CONFIG_PASSPHRASE / PULUMI_CONFIG_PASSPHRASE_FILE) before deploying"
    )]
    MissingPassphrase,

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StratusError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }

    /// Build an engine failure from raw command output, typed by [`classify_error_text`].
    pub fn from_engine_output(stack: &str, operation: &str, text: &str) -> Self {
        let detail = text.trim().to_string();
        match classify_error_text(&detail) {
            ErrorKind::Lock => Self::StackLocked {
                stack: stack.to_string(),
                operation: operation.to_string(),
                detail,
            },
            _ => Self::Provisioning {
                operation: operation.to_string(),
                message: last_error_line(&detail),
                detail,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Backend { .. } => ErrorKind::Backend,
            Self::Build { .. } => ErrorKind::Build,
            Self::StackLocked { .. } => ErrorKind::Lock,
            Self::Provisioning { .. } => ErrorKind::Provisioning,
            Self::InvalidConfig { .. } | Self::MissingPassphrase => ErrorKind::Config,
            Self::IoError { .. } | Self::Internal(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    pub fn is_lock(&self) -> bool {
        self.kind() == ErrorKind::Lock
    }

    /// Underlying detail that is only shown with `--debug`.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::StackLocked { detail, .. } => Some(detail),
            Self::Provisioning { detail, .. } if !detail.is_empty() => Some(detail),
            Self::Build { output, .. } => output.as_deref(),
            _ => None,
        }
    }
}

/// Text fragments the provisioning engine uses when a stack is held by
/// another update.
const LOCK_SIGNATURES: &[&str] = &[
    "stack is currently locked",
    "another update is currently in progress",
    "[409] conflict",
    "conflict: another update",
];

/// Classify raw engine error text.
///
/// This is the single place where engine output is pattern-matched.
pub fn classify_error_text(text: &str) -> ErrorKind {
    let lowered = text.to_lowercase();
    if LOCK_SIGNATURES.iter().any(|sig| lowered.contains(sig)) {
        ErrorKind::Lock
    } else {
        ErrorKind::Provisioning
    }
}

/// Pick the most useful line of a multi-line engine failure for the short message.
fn last_error_line(text: &str) -> String {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with("error:"))
        .or_else(|| text.lines().map(str::trim).rfind(|l| !l.is_empty()))
        .unwrap_or("unknown error")
        .to_string()
}
