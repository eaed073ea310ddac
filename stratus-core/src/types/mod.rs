//! Core domain types for stratus.

pub mod backend;
pub mod request;
pub mod result;

// Re-exports
pub use backend::{BackendDescriptor, BackendKind};
pub use request::{BackendPreference, BuildFlags, DeploymentRequest, OperationMode};
pub use result::{ChangeCounts, DeploymentResult, DiffSummary, StackOutputs};
