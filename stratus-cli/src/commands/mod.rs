//! CLI command implementations

pub mod cancel;
pub mod deploy;
pub mod outputs;

use crate::GlobalArgs;
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use stratus_core::{
    backend::AwsCliStore, build::ShellBuildRunner, engine::PulumiEngine, BackendPreference,
    Collaborators, EnvSignals, Project, StratusError,
};

/// Everything a command needs: the resolved project plus the production
/// collaborators.
pub struct Workspace {
    pub project: Project,
    pub signals: EnvSignals,
    engine: PulumiEngine,
    store: AwsCliStore,
    builder: ShellBuildRunner,
}

impl Workspace {
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let dir = match &global.cwd {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to read the current directory")?,
        };
        let dir: PathBuf = dir
            .canonicalize()
            .with_context(|| format!("Project directory {} not found", dir.display()))?;

        let project = Project::load(&dir)?;
        let signals = EnvSignals::from_env();
        let region = signals.effective_region(project.region.as_deref());
        let engine = PulumiEngine::new(
            project.program_dir.clone(),
            signals.passphrase.clone(),
            region,
            global.debug,
        );

        tracing::debug!(project = %project.name, dir = %dir.display(), "Loaded project");
        Ok(Self { project, signals, engine, store: AwsCliStore::new(), builder: ShellBuildRunner })
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators { engine: &self.engine, store: &self.store, builder: &self.builder }
    }

    /// `--backend` wins over `backend` in stratus.json; `auto` otherwise.
    pub fn backend_preference(&self, flag: Option<&str>) -> Result<BackendPreference> {
        match flag {
            Some(value) => Ok(value.parse()?),
            None => Ok(self.project.backend.unwrap_or_default()),
        }
    }
}

/// The stack name is required for every command.
pub fn stack_name(global: &GlobalArgs) -> Result<&str> {
    global
        .stack
        .as_deref()
        .ok_or_else(|| anyhow!("No stack given. Pass --stack <name> (or set STRATUS_STACK)"))
}

/// Print a fatal error. `--debug` adds the engine or build detail and the
/// full cause chain.
pub fn print_error(err: &anyhow::Error, debug: bool) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if !debug {
        if err.downcast_ref::<StratusError>().and_then(StratusError::detail).is_some() {
            eprintln!("{}", "Run with --debug for the full engine output.".dimmed());
        }
        return;
    }

    if let Some(detail) = err.downcast_ref::<StratusError>().and_then(StratusError::detail) {
        eprintln!();
        eprintln!("{}", "Details:".bold());
        for line in detail.lines() {
            eprintln!("  {}", line);
        }
    }

    for cause in err.chain().skip(1) {
        eprintln!("  {} {}", "caused by:".dimmed(), cause);
    }
    eprintln!();
    eprintln!("{:?}", err);
}
