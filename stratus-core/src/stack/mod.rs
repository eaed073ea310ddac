//! Stack lifecycle: select the stack, apply baseline config, refresh.

mod recovery;

pub use recovery::{with_lock_recovery, LOCK_RETRIES};

use crate::engine::{ProvisioningEngine, StackHandle, REGION_CONFIG_KEY};
use crate::error::Result;
use crate::progress::{DrawTarget, ProgressInterpreter};
use crate::types::BackendDescriptor;
use tracing::{info, instrument};

/// Prepares the stack for one invocation.
///
/// Holds no handle itself; [`StackManager::initialize`] hands back the only
/// live one.
pub struct StackManager<'a> {
    engine: &'a dyn ProvisioningEngine,
    verbose: bool,
    target: DrawTarget,
}

impl<'a> StackManager<'a> {
    pub fn new(engine: &'a dyn ProvisioningEngine, verbose: bool) -> Self {
        Self { engine, verbose, target: DrawTarget::Terminal }
    }

    pub fn with_draw_target(mut self, target: DrawTarget) -> Self {
        self.target = target;
        self
    }

    /// Create or select `name` on `backend`, set the region and refresh.
    #[instrument(skip(self, backend), fields(engine = self.engine.name(), location = %backend))]
    pub async fn initialize(
        &self,
        name: &str,
        backend: &BackendDescriptor,
        region: &str,
    ) -> Result<Box<dyn StackHandle>> {
        let stack = self.engine.create_or_select_stack(name, backend).await?;
        info!("Selected stack {}", stack.name());

        stack.set_config(REGION_CONFIG_KEY, region).await?;

        self.refresh(stack.as_ref()).await?;
        Ok(stack)
    }

    /// Refresh stack state, recovering once from a stale lock.
    pub async fn refresh(&self, stack: &dyn StackHandle) -> Result<()> {
        let progress = ProgressInterpreter::new("Refresh", self.verbose, self.target);

        progress
            .track(|tx| {
                with_lock_recovery(
                    "refresh",
                    LOCK_RETRIES,
                    move || stack.refresh(tx.clone()),
                    move || stack.cancel(),
                )
            })
            .await?;
        Ok(())
    }
}
