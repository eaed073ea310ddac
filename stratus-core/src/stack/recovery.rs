//! One-shot recovery from stack lock contention.

use crate::error::Result;
use std::future::Future;
use tracing::{debug, warn};

/// Retries allowed per phase after a lock failure.
pub const LOCK_RETRIES: u32 = 1;

/// Run `operation`; when it fails because the stack is locked, call `cancel`
/// to clear the stale operation and try again, at most `max_retries` times.
///
/// A failing `cancel` does not stop the retry. Errors that are not lock
/// errors, and the lock error of the last attempt, are returned unchanged.
pub async fn with_lock_recovery<T, Op, OpFut, Cancel, CancelFut>(
    phase: &str,
    max_retries: u32,
    mut operation: Op,
    mut cancel: Cancel,
) -> Result<T>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T>>,
    Cancel: FnMut() -> CancelFut,
    CancelFut: Future<Output = Result<()>>,
{
    let mut retries = 0;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_lock() || retries >= max_retries {
            return Err(err);
        }
        retries += 1;

        warn!(
            phase,
            attempt = retries,
            "Stack is locked, cancelling the stale operation and retrying"
        );
        match cancel().await {
            Ok(()) => debug!(phase, "Cancelled in-flight operation"),
            Err(cancel_err) => warn!(phase, error = %cancel_err, "Cancel failed, retrying anyway"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, StratusError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn locked() -> StratusError {
        StratusError::from_engine_output("prod", "refresh", "error: the stack is currently locked")
    }

    fn denied() -> StratusError {
        StratusError::from_engine_output("prod", "refresh", "error: AccessDenied")
    }

    /// Fails with errors of the scripted kinds in order, then succeeds.
    async fn scripted(
        failures: &[ErrorKind],
        cancel_fails: bool,
    ) -> (Result<&'static str>, u32, u32) {
        let attempts = &AtomicU32::new(0);
        let cancels = &AtomicU32::new(0);

        let result = with_lock_recovery(
            "refresh",
            LOCK_RETRIES,
            move || async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) as usize;
                match failures.get(n) {
                    Some(ErrorKind::Lock) => Err(locked()),
                    Some(_) => Err(denied()),
                    None => Ok("refreshed"),
                }
            },
            move || async move {
                cancels.fetch_add(1, Ordering::SeqCst);
                if cancel_fails {
                    Err(StratusError::Internal("no lock to cancel".into()))
                } else {
                    Ok(())
                }
            },
        )
        .await;

        (result, attempts.load(Ordering::SeqCst), cancels.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_success_without_retry() {
        let (result, attempts, cancels) = scripted(&[], false).await;
        assert_eq!(result.unwrap(), "refreshed");
        assert_eq!((attempts, cancels), (1, 0));
    }

    #[tokio::test]
    async fn test_lock_recovered_once() {
        let (result, attempts, cancels) = scripted(&[ErrorKind::Lock], false).await;
        assert_eq!(result.unwrap(), "refreshed");
        assert_eq!((attempts, cancels), (2, 1));
    }

    #[tokio::test]
    async fn test_second_lock_propagates() {
        let (result, attempts, cancels) = scripted(&[ErrorKind::Lock; 3], false).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Lock);
        assert_eq!((attempts, cancels), (2, 1));
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let (result, attempts, cancels) = scripted(&[ErrorKind::Provisioning], false).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provisioning);
        assert_eq!(err.to_string(), "refresh failed: error: AccessDenied");
        assert_eq!((attempts, cancels), (1, 0));
    }

    #[tokio::test]
    async fn test_cancel_failure_still_retries() {
        let (result, attempts, cancels) = scripted(&[ErrorKind::Lock], true).await;
        assert_eq!(result.unwrap(), "refreshed");
        assert_eq!((attempts, cancels), (2, 1));
    }

    #[tokio::test]
    async fn test_non_lock_after_recovery_propagates() {
        let (result, attempts, _) =
            scripted(&[ErrorKind::Lock, ErrorKind::Provisioning], false).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Provisioning);
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn test_zero_budget() {
        let attempts = &AtomicU32::new(0);
        let result: Result<()> = with_lock_recovery(
            "up",
            0,
            move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(locked())
            },
            || async { Ok(()) },
        )
        .await;
        assert!(result.unwrap_err().is_lock());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
