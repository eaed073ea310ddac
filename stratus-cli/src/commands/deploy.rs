//! `stratus up`, `stratus preview` and `stratus destroy`

use super::{stack_name, Workspace};
use crate::GlobalArgs;
use anyhow::Result;
use colored::Colorize;
use std::io::{self, Write};
use stratus_core::{summary, BuildFlags, Deployment, DeploymentRequest, EnvSignals, OperationMode};

pub async fn run(global: &GlobalArgs, mode: OperationMode) -> Result<()> {
    let workspace = Workspace::load(global)?;
    let request = DeploymentRequest::new(stack_name(global)?, mode)
        .with_verbosity(global.verbose, global.debug)
        .with_backend(workspace.backend_preference(global.backend.as_deref())?)
        .with_build(BuildFlags {
            build: global.build,
            skip_build: global.skip_build,
            build_command: global.build_command.clone(),
        });

    println!(
        "{} {} {} (stack {})",
        "→".cyan().bold(),
        mode.verb(),
        workspace.project.name.bold(),
        request.stack.cyan()
    );

    let report = Deployment::new(&workspace.project, &workspace.signals, workspace.collaborators())
        .run(&request)
        .await?;

    tracing::info!(backend = %report.backend, built = report.built, "Operation finished");
    println!();
    summary::print(&report.execution);
    Ok(())
}

/// Ask before destroying. `--yes` and CI skip the prompt.
pub fn confirm_destroy(global: &GlobalArgs, yes: bool) -> Result<bool> {
    if yes || EnvSignals::from_env().ci {
        return Ok(true);
    }

    let stack = stack_name(global)?;
    print!(
        "{} This will delete every resource in stack {}. Continue? [y/N] ",
        "!".yellow().bold(),
        stack.cyan()
    );
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
