//! `stratus outputs`

use super::{stack_name, Workspace};
use crate::GlobalArgs;
use anyhow::{Context, Result};
use stratus_core::{summary, Deployment};

pub async fn run(global: &GlobalArgs, json: bool) -> Result<()> {
    let workspace = Workspace::load(global)?;
    let stack = stack_name(global)?;
    let preference = workspace.backend_preference(global.backend.as_deref())?;

    let handle = Deployment::new(&workspace.project, &workspace.signals, workspace.collaborators())
        .open_stack(stack, preference)
        .await?;
    let outputs = handle.outputs().await?;

    if json {
        let text = serde_json::to_string_pretty(&outputs).context("Failed to encode outputs")?;
        println!("{}", text);
        return Ok(());
    }

    match summary::render_outputs(&outputs) {
        Some(table) => println!("{}", table),
        None => println!("Stack {} has no outputs", stack),
    }
    Ok(())
}
