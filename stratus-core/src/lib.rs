//! stratus core library
//!
//! Deployment orchestration for serverless web-framework hosting: state
//! backend resolution, build detection, stack lifecycle with lock recovery,
//! and progress rendering for the external provisioning engine.

pub mod backend;
pub mod build;
pub mod config;
pub mod deployment;
pub mod engine;
pub mod env;
pub mod error;
pub mod executor;
pub mod format;
pub mod observability;
pub mod paths;
pub mod progress;
pub mod stack;
pub mod summary;
pub mod types;

// Re-export commonly used items
pub use config::Project;
pub use deployment::{Collaborators, Deployment, Report};
pub use env::EnvSignals;
pub use error::{ErrorKind, Result, StratusError};
pub use executor::{DeploymentExecutor, Execution, Outcome};
pub use observability::{init as init_observability, Verbosity};
pub use types::{
    BackendDescriptor, BackendKind, BackendPreference, BuildFlags, ChangeCounts, DeploymentRequest,
    DeploymentResult, DiffSummary, OperationMode, StackOutputs,
};
