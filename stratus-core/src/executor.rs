//! Deployment executor: runs exactly one of preview, apply or destroy.

use crate::engine::StackHandle;
use crate::error::{Result, StratusError};
use crate::progress::{DrawTarget, ProgressInterpreter, ProgressState};
use crate::stack::{with_lock_recovery, LOCK_RETRIES};
use crate::types::{DeploymentResult, DiffSummary, OperationMode, StackOutputs};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// What a completed operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Previewed(DiffSummary),
    Applied(DeploymentResult),
    Destroyed { stack: String, elapsed: Duration },
}

/// A finished operation plus the progress observed while it ran.
#[derive(Debug, Clone)]
pub struct Execution {
    pub outcome: Outcome,
    pub progress: ProgressState,
}

pub struct DeploymentExecutor<'a> {
    stack: &'a dyn StackHandle,
    verbose: bool,
    target: DrawTarget,
}

impl<'a> DeploymentExecutor<'a> {
    pub fn new(stack: &'a dyn StackHandle, verbose: bool) -> Self {
        Self { stack, verbose, target: DrawTarget::Terminal }
    }

    pub fn with_draw_target(mut self, target: DrawTarget) -> Self {
        self.target = target;
        self
    }

    /// Run the operation selected by `mode`.
    #[instrument(skip(self), fields(stack = self.stack.name()))]
    pub async fn execute(&self, mode: OperationMode) -> Result<Execution> {
        match mode {
            OperationMode::Preview => self.preview().await,
            OperationMode::Apply => self.apply().await,
            OperationMode::Destroy => self.destroy().await,
        }
    }

    /// Dry run. Engine output is only logged; nothing is mutated.
    pub async fn preview(&self) -> Result<Execution> {
        let stack = self.stack;
        let progress = ProgressInterpreter::passive("Preview", self.verbose, self.target);

        let (diff, progress) = progress.track(|tx| stack.preview(tx)).await?;
        info!(changes = diff.changes.total_changes(), "Preview finished");

        Ok(Execution { outcome: Outcome::Previewed(diff), progress })
    }

    /// Provision or update resources.
    ///
    /// A lock failure is recovered once by cancelling the stale operation;
    /// a second one is reported as the stack being locked. Outputs are read
    /// once the update has succeeded and are never retried with it.
    pub async fn apply(&self) -> Result<Execution> {
        let stack = self.stack;
        let started = Instant::now();
        let progress = ProgressInterpreter::new("Deploy", self.verbose, self.target);

        let (changes, progress) = progress
            .track(|tx| {
                with_lock_recovery(
                    "up",
                    LOCK_RETRIES,
                    move || stack.up(tx.clone()),
                    move || stack.cancel(),
                )
            })
            .await
            .map_err(|err| locked_as_user_error(stack.name(), err))?;

        let outputs = match stack.outputs().await {
            Ok(outputs) => outputs,
            Err(e) => {
                warn!("Deployed, but reading stack outputs failed: {}", e);
                StackOutputs::new()
            }
        };

        // Counts come from the engine's own summary; the progress counters
        // are estimates.
        let result = DeploymentResult {
            stack: stack.name().to_string(),
            changes,
            outputs,
            elapsed: started.elapsed(),
        };
        info!(
            created = result.changes.created,
            updated = result.changes.updated,
            deleted = result.changes.deleted,
            "Deploy finished"
        );

        Ok(Execution { outcome: Outcome::Applied(result), progress })
    }

    /// Tear down every managed resource.
    pub async fn destroy(&self) -> Result<Execution> {
        let stack = self.stack;
        let started = Instant::now();
        let progress = ProgressInterpreter::new("Destroy", self.verbose, self.target);

        let ((), progress) = progress.track(|tx| stack.destroy(tx)).await?;
        info!("Destroy finished");

        Ok(Execution {
            outcome: Outcome::Destroyed {
                stack: stack.name().to_string(),
                elapsed: started.elapsed(),
            },
            progress,
        })
    }
}

/// Any lock failure that survives recovery becomes the one user-facing
/// "stack is locked" error, whatever form the engine reported it in.
fn locked_as_user_error(stack: &str, err: StratusError) -> StratusError {
    if !err.is_lock() {
        return err;
    }
    let detail = match err {
        StratusError::StackLocked { detail, .. } => detail,
        other => other.to_string(),
    };
    StratusError::StackLocked { stack: stack.to_string(), operation: "up".into(), detail }
}
