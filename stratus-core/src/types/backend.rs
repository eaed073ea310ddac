//! State backend types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Kind of backend holding stack state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Resolved location for stack state. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub kind: BackendKind,

    /// Backend URL handed to the engine (`file://...` or `s3://...?region=...`).
    pub url: String,

    /// Local state directory (local backends only).
    pub path: Option<PathBuf>,

    /// Bucket name (remote backends only).
    pub bucket: Option<String>,

    /// Region qualifier for remote backends.
    pub region: Option<String>,
}

impl BackendDescriptor {
    pub fn local(path: PathBuf) -> Self {
        Self {
            kind: BackendKind::Local,
            url: format!("file://{}", path.display()),
            path: Some(path),
            bucket: None,
            region: None,
        }
    }

    pub fn remote(bucket: &str, region: &str) -> Self {
        Self {
            kind: BackendKind::Remote,
            url: format!("s3://{}?region={}", bucket, region),
            path: None,
            bucket: Some(bucket.to_string()),
            region: Some(region.to_string()),
        }
    }

    pub fn is_local(&self) -> bool {
        self.kind == BackendKind::Local
    }
}

impl fmt::Display for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_url() {
        let backend = BackendDescriptor::local(PathBuf::from("/home/dev/.stratus/state"));
        assert_eq!(backend.url, "file:///home/dev/.stratus/state");
        assert!(backend.is_local());
    }

    #[test]
    fn test_remote_url() {
        let backend = BackendDescriptor::remote("stratus-state-1234", "eu-west-1");
        assert_eq!(backend.url, "s3://stratus-state-1234?region=eu-west-1");
        assert_eq!(backend.kind, BackendKind::Remote);
        assert_eq!(backend.to_string(), backend.url);
    }
}
