//! Ambient environment signals consumed by backend resolution and the engine.

use crate::paths;
use std::path::PathBuf;

/// Region used when nothing else names one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Snapshot of the environment taken once per invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSignals {
    /// Running under continuous integration.
    pub ci: bool,

    /// Cloud credentials are present.
    pub has_credentials: bool,

    /// Cloud account identifier, used to disambiguate remote backends.
    pub account_id: Option<String>,

    /// Region named by the environment.
    pub region: Option<String>,

    /// Home directory for the local backend root.
    pub home_dir: PathBuf,

    /// Passphrase protecting stack secrets.
    pub passphrase: Option<Passphrase>,
}

/// How the secrets passphrase was supplied.
#[derive(Clone, PartialEq, Eq)]
pub enum Passphrase {
    Value(String),
    File(PathBuf),
}

impl std::fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Passphrase(<redacted>)"),
            Self::File(path) => write!(f, "PassphraseFile({})", path.display()),
        }
    }
}

impl EnvSignals {
    /// Read signals from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), paths::home_dir())
    }

    /// Read signals through an arbitrary lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F, home_dir: PathBuf) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ci = non_empty("CI").is_some_and(|v| !matches!(v.trim(), "0" | "false" | "FALSE"));

        let has_credentials = (non_empty("AWS_ACCESS_KEY_ID").is_some()
            && non_empty("AWS_SECRET_ACCESS_KEY").is_some())
            || non_empty("AWS_PROFILE").is_some()
            || non_empty("AWS_WEB_IDENTITY_TOKEN_FILE").is_some();

        let passphrase = non_empty("STRATUS_CONFIG_PASSPHRASE")
            .or_else(|| non_empty("PULUMI_CONFIG_PASSPHRASE"))
            .map(Passphrase::Value)
            .or_else(|| {
                non_empty("PULUMI_CONFIG_PASSPHRASE_FILE").map(|p| Passphrase::File(p.into()))
            });

        Self {
            ci,
            has_credentials,
            account_id: non_empty("AWS_ACCOUNT_ID"),
            region: non_empty("AWS_REGION").or_else(|| non_empty("AWS_DEFAULT_REGION")),
            home_dir,
            passphrase,
        }
    }

    /// Region from the environment, then the project, then the default.
    pub fn effective_region(&self, configured: Option<&str>) -> String {
        self.region
            .as_deref()
            .or(configured)
            .unwrap_or(DEFAULT_REGION)
            .to_string()
    }
}
