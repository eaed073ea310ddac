//! State backend resolution.
//!
//! Decides whether stack state lives on the local filesystem or in a remote
//! object store, and makes sure the chosen location exists before any stack
//! operation runs.

mod s3;

pub use s3::AwsCliStore;

use crate::config::sanitize_name;
use crate::env::EnvSignals;
use crate::error::{Result, StratusError};
use crate::paths;
use crate::types::{BackendDescriptor, BackendPreference};
use async_trait::async_trait;
use tracing::{debug, info, instrument};

/// Fixed prefix of remote state bucket names.
pub const REMOTE_BUCKET_PREFIX: &str = "stratus-state-";

/// Longest bucket name the object store accepts.
const MAX_BUCKET_LEN: usize = 63;

/// Object store that can hold remote stack state.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Make sure `bucket` exists in `region`, creating it if absent.
    ///
    /// Must succeed when the bucket already exists and is ours.
    async fn ensure_location(&self, bucket: &str, region: &str) -> Result<()>;
}

/// Resolves a [`BackendDescriptor`] from the request preference and ambient signals.
pub struct BackendResolver<'a> {
    signals: &'a EnvSignals,
    store: &'a dyn RemoteStore,
}

impl<'a> BackendResolver<'a> {
    pub fn new(signals: &'a EnvSignals, store: &'a dyn RemoteStore) -> Self {
        Self { signals, store }
    }

    /// Resolve and ensure the backend for `project`.
    ///
    /// `auto` goes remote only under CI with credentials present.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        preference: BackendPreference,
        project: &str,
        region: &str,
    ) -> Result<BackendDescriptor> {
        let backend = self.locate(preference, project, region)?;
        match (&backend.bucket, &backend.path) {
            (Some(bucket), _) => {
                debug!(bucket = %bucket, region = %region, "Ensuring remote state bucket");
                self.store.ensure_location(bucket, region).await?;
            }
            (None, Some(dir)) => {
                std::fs::create_dir_all(dir)
                    .map_err(|e| StratusError::IoError { path: dir.clone(), source: e })?;
            }
            (None, None) => {}
        }
        info!(backend = %backend, "Using {} state backend", backend.kind);
        Ok(backend)
    }

    /// Work out where state for `project` lives without creating anything.
    ///
    /// Used by commands that only read an existing stack.
    pub fn locate(
        &self,
        preference: BackendPreference,
        project: &str,
        region: &str,
    ) -> Result<BackendDescriptor> {
        let remote = match preference {
            BackendPreference::Remote => true,
            BackendPreference::Auto => self.signals.ci && self.signals.has_credentials,
            BackendPreference::Local => false,
        };

        if remote {
            let bucket = remote_bucket_name(self.signals.account_id.as_deref(), project)?;
            Ok(BackendDescriptor::remote(&bucket, region))
        } else {
            Ok(BackendDescriptor::local(paths::local_state_dir(&self.signals.home_dir)))
        }
    }
}

/// Deterministic remote bucket name: the fixed prefix plus the account id
/// when known, else the project name.
pub fn remote_bucket_name(account_id: Option<&str>, project: &str) -> Result<String> {
    let suffix = match account_id {
        Some(id) => sanitize_name(id),
        None => sanitize_name(project),
    };
    if suffix.is_empty() {
        return Err(StratusError::InvalidConfig {
            reason: "cannot derive a remote state bucket name: no account id or project name"
                .into(),
        });
    }

    let mut name = format!("{}{}", REMOTE_BUCKET_PREFIX, suffix);
    name.truncate(MAX_BUCKET_LEN);
    Ok(name.trim_end_matches('-').to_string())
}
