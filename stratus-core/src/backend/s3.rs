//! Remote state buckets managed through the `aws` CLI.

use super::RemoteStore;
use crate::error::{Result, StratusError};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, instrument};

/// [`RemoteStore`] backed by S3, driven through the `aws` command.
#[derive(Debug, Clone)]
pub struct AwsCliStore {
    binary: String,
}

impl Default for AwsCliStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AwsCliStore {
    /// Use the `aws` binary on `PATH`, or `STRATUS_AWS_BIN` when set.
    pub fn new() -> Self {
        Self { binary: std::env::var("STRATUS_AWS_BIN").unwrap_or_else(|_| "aws".to_string()) }
    }

    async fn s3api(&self, bucket: &str, args: &[&str]) -> Result<std::process::Output> {
        Command::new(&self.binary).arg("s3api").args(args).output().await.map_err(|e| {
            StratusError::Backend {
                location: format!("s3://{}", bucket),
                reason: format!("failed to run {}: {}", self.binary, e),
            }
        })
    }
}

#[async_trait]
impl RemoteStore for AwsCliStore {
    #[instrument(skip(self))]
    async fn ensure_location(&self, bucket: &str, region: &str) -> Result<()> {
        let output =
            self.s3api(bucket, &["head-bucket", "--bucket", bucket, "--region", region]).await?;

        if output.status.success() {
            info!("State bucket {} already exists", bucket);
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !is_not_found(&stderr) {
            return Err(StratusError::Backend {
                location: format!("s3://{}", bucket),
                reason: stderr.trim().to_string(),
            });
        }

        info!("Creating state bucket {} in {}", bucket, region);
        let constraint = format!("LocationConstraint={}", region);
        let mut args = vec!["create-bucket", "--bucket", bucket, "--region", region];
        // us-east-1 rejects an explicit location constraint
        if region != "us-east-1" {
            args.extend(["--create-bucket-configuration", constraint.as_str()]);
        }

        let output = self.s3api(bucket, &args).await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("BucketAlreadyOwnedByYou") {
            return Ok(());
        }

        Err(StratusError::Backend {
            location: format!("s3://{}", bucket),
            reason: stderr.trim().to_string(),
        })
    }
}

fn is_not_found(stderr: &str) -> bool {
    stderr.contains("404") || stderr.contains("Not Found") || stderr.contains("NoSuchBucket")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        assert!(is_not_found(
            "An error occurred (404) when calling the HeadBucket operation: Not Found"
        ));
        assert!(!is_not_found(
            "An error occurred (403) when calling the HeadBucket operation: Forbidden"
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_backend_error() {
        let store = AwsCliStore { binary: "/nonexistent/aws".into() };
        let err = store.ensure_location("stratus-state-x", "us-east-1").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Backend);
    }
}
