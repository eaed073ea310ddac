//! The deployment pipeline.
//!
//! Phases run strictly in order: backend resolution, optional build, stack
//! selection with config and refresh, then the one requested operation.
//! Any error aborts the remaining phases.

use crate::backend::{BackendResolver, RemoteStore};
use crate::build::{should_build, BuildRunner};
use crate::config::Project;
use crate::engine::{ProvisioningEngine, StackHandle};
use crate::env::EnvSignals;
use crate::error::{Result, StratusError};
use crate::executor::{DeploymentExecutor, Execution};
use crate::format::format_duration;
use crate::progress::DrawTarget;
use crate::stack::StackManager;
use crate::types::{BackendDescriptor, BackendPreference, DeploymentRequest, OperationMode};
use colored::Colorize;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// External collaborators the pipeline drives.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub engine: &'a dyn ProvisioningEngine,
    pub store: &'a dyn RemoteStore,
    pub builder: &'a dyn BuildRunner,
}

/// What a pipeline run produced.
#[derive(Debug, Clone)]
pub struct Report {
    pub backend: BackendDescriptor,
    pub built: bool,
    pub execution: Execution,
}

pub struct Deployment<'a> {
    project: &'a Project,
    signals: &'a EnvSignals,
    collaborators: Collaborators<'a>,
    target: DrawTarget,
}

impl<'a> Deployment<'a> {
    pub fn new(
        project: &'a Project,
        signals: &'a EnvSignals,
        collaborators: Collaborators<'a>,
    ) -> Self {
        Self { project, signals, collaborators, target: DrawTarget::Terminal }
    }

    pub fn with_draw_target(mut self, target: DrawTarget) -> Self {
        self.target = target;
        self
    }

    /// Run the full pipeline for `request`.
    #[instrument(skip(self, request), fields(stack = %request.stack, mode = %request.mode))]
    pub async fn run(&self, request: &DeploymentRequest) -> Result<Report> {
        request.validate()?;

        let region = self.region();
        let backend = self.resolve_backend(request.backend, &region).await?;

        // Preview only builds on an explicit --build; destroy never builds.
        let built = match request.mode {
            OperationMode::Apply => self.build(request).await?,
            OperationMode::Preview if request.build.build => self.build(request).await?,
            OperationMode::Preview | OperationMode::Destroy => false,
        };

        let manager = StackManager::new(self.collaborators.engine, request.verbose)
            .with_draw_target(self.target);
        let stack = manager.initialize(&request.stack, &backend, &region).await?;

        let execution = DeploymentExecutor::new(stack.as_ref(), request.verbose)
            .with_draw_target(self.target)
            .execute(request.mode)
            .await?;

        Ok(Report { backend, built, execution })
    }

    /// Select an existing stack without refreshing it (outputs, manual cancel).
    ///
    /// Nothing is created: neither the backend location nor the stack.
    pub async fn open_stack(
        &self,
        name: &str,
        preference: BackendPreference,
    ) -> Result<Box<dyn StackHandle>> {
        let backend = BackendResolver::new(self.signals, self.collaborators.store).locate(
            preference,
            &self.project.name,
            &self.region(),
        )?;
        self.collaborators.engine.select_stack(name, &backend).await
    }

    fn region(&self) -> String {
        self.signals.effective_region(self.project.region.as_deref())
    }

    async fn resolve_backend(
        &self,
        preference: BackendPreference,
        region: &str,
    ) -> Result<BackendDescriptor> {
        BackendResolver::new(self.signals, self.collaborators.store)
            .resolve(preference, &self.project.name, region)
            .await
    }

    /// Run the build when needed. Returns whether a build ran.
    async fn build(&self, request: &DeploymentRequest) -> Result<bool> {
        let flags = &request.build;
        let expected = self.project.expected_output_dir();
        if !should_build(flags.build, flags.skip_build, expected.as_deref()) {
            info!("Skipping build");
            return Ok(false);
        }

        let command =
            flags.build_command.clone().or_else(|| self.project.default_build_command());
        let command = match command {
            Some(command) => command,
            None if flags.build => {
                return Err(StratusError::InvalidConfig {
                    reason: "no build command: pass --build-command or set buildCommand \
                             in stratus.json"
                        .into(),
                })
            }
            None => {
                warn!("No framework detected and no build command configured, skipping build");
                return Ok(false);
            }
        };

        println!("{} Building with {}", "→".cyan().bold(), command.bold());
        let started = Instant::now();
        self.collaborators
            .builder
            .run_build(&command, &self.project.dir, request.verbose)
            .await?;
        println!(
            "{} Build completed in {}",
            "✓".green().bold(),
            format_duration(started.elapsed().as_secs_f64())
        );
        Ok(true)
    }
}
