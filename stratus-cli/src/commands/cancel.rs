//! `stratus cancel`

use super::{stack_name, Workspace};
use crate::GlobalArgs;
use anyhow::Result;
use colored::Colorize;
use stratus_core::Deployment;

/// Cancel whatever operation holds the stack lock.
pub async fn run(global: &GlobalArgs) -> Result<()> {
    let workspace = Workspace::load(global)?;
    let stack = stack_name(global)?;
    let preference = workspace.backend_preference(global.backend.as_deref())?;

    let handle = Deployment::new(&workspace.project, &workspace.signals, workspace.collaborators())
        .open_stack(stack, preference)
        .await?;
    handle.cancel().await?;

    println!("{} Cleared the lock on stack {}", "✓".green().bold(), stack.cyan());
    Ok(())
}
