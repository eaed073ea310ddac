//! Provisioning engine abstraction.
//!
//! stratus drives an external declarative provisioning engine through the
//! `ProvisioningEngine` / `StackHandle` traits:
//! - `PulumiEngine`: the `pulumi` CLI (production)
//! - test doubles implement the same traits
//!
//! Long-running calls report progress over a single ordered channel of
//! [`EngineMessage`]s, consumed by the progress interpreter.

pub mod events;
mod pulumi;

pub use events::{EngineEvent, EngineMessage, EventCategory, ResourceEvent, ResourcePhase};
pub use pulumi::PulumiEngine;

use crate::error::Result;
use crate::types::{BackendDescriptor, ChangeCounts, DiffSummary, StackOutputs};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Sending half of the engine message channel.
pub type EngineSender = mpsc::UnboundedSender<EngineMessage>;

/// Receiving half of the engine message channel.
pub type EngineReceiver = mpsc::UnboundedReceiver<EngineMessage>;

/// Create an engine message channel.
pub fn channel() -> (EngineSender, EngineReceiver) {
    mpsc::unbounded_channel()
}

/// Config key holding the target region.
pub const REGION_CONFIG_KEY: &str = "aws:region";

/// External provisioning engine.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Create the named stack, or select it if it exists.
    async fn create_or_select_stack(
        &self,
        name: &str,
        backend: &BackendDescriptor,
    ) -> Result<Box<dyn StackHandle>>;

    /// Select an existing stack. Fails when the stack does not exist.
    async fn select_stack(
        &self,
        name: &str,
        backend: &BackendDescriptor,
    ) -> Result<Box<dyn StackHandle>>;

    /// Engine name (for logging).
    fn name(&self) -> &str;
}

/// A selected stack, live for one invocation.
///
/// Long-running operations send engine text and events to `tx` in delivery
/// order and never call back into the handle.
#[async_trait]
pub trait StackHandle: Send + Sync {
    /// Stack name.
    fn name(&self) -> &str;

    /// Durably set a stack config value.
    async fn set_config(&self, key: &str, value: &str) -> Result<()>;

    /// Refresh state from the provider's live resources.
    async fn refresh(&self, tx: EngineSender) -> Result<()>;

    /// Compute a dry-run diff.
    async fn preview(&self, tx: EngineSender) -> Result<DiffSummary>;

    /// Provision or update resources, returning the engine's change counts.
    async fn up(&self, tx: EngineSender) -> Result<ChangeCounts>;

    /// Tear down every managed resource.
    async fn destroy(&self, tx: EngineSender) -> Result<()>;

    /// Cancel an in-flight (possibly abandoned) operation, clearing its lock.
    async fn cancel(&self) -> Result<()>;

    /// Current stack outputs.
    async fn outputs(&self) -> Result<StackOutputs>;
}
