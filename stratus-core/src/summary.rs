//! Result presentation after a successful operation.

use crate::executor::{Execution, Outcome};
use crate::format::{format_duration, pluralize};
use crate::progress::ProgressState;
use crate::types::{ChangeCounts, DeploymentResult, DiffSummary, StackOutputs};
use colored::Colorize;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct OutputRow {
    #[tabled(rename = "OUTPUT")]
    name: String,
    #[tabled(rename = "VALUE")]
    value: String,
}

/// Render the summary for a finished operation.
pub fn render(execution: &Execution) -> String {
    match &execution.outcome {
        Outcome::Previewed(diff) => render_preview(diff),
        Outcome::Applied(result) => render_apply(result, &execution.progress),
        Outcome::Destroyed { stack, elapsed } => render_destroy(stack, *elapsed),
    }
}

pub fn print(execution: &Execution) {
    println!("{}", render(execution));
}

/// Diff-style counts for a dry run.
pub fn render_preview(diff: &DiffSummary) -> String {
    let changes = &diff.changes;
    if changes.is_empty() {
        return format!(
            "{} No changes. {} up to date.",
            "=".dimmed(),
            pluralize(changes.unchanged, "resource")
        );
    }

    let mut lines = vec![format!("{}", "Planned changes:".bold())];
    lines.push(format!("  {} {} to create", "+".green().bold(), changes.created));
    lines.push(format!("  {} {} to update", "~".yellow().bold(), changes.updated));
    lines.push(format!("  {} {} to delete", "-".red().bold(), changes.deleted));
    lines.push(format!("  {} {} unchanged", "=".dimmed(), changes.unchanged));
    lines.join("\n")
}

/// Change counts and outputs for a completed apply.
pub fn render_apply(result: &DeploymentResult, progress: &ProgressState) -> String {
    let mut lines = vec![format!(
        "{} Stack {} deployed in {}",
        "✓".green().bold(),
        result.stack.cyan(),
        format_duration(result.elapsed.as_secs_f64())
    )];

    lines.push(format!("  {}", change_line(&result.changes)));
    if progress.files_uploaded > 0 {
        lines.push(format!("  {} uploaded", pluralize(progress.files_uploaded, "file")));
    }

    let urls = url_outputs(&result.outputs);
    if !urls.is_empty() {
        lines.push(String::new());
        for (name, url) in urls {
            lines.push(format!("  {} {}", format!("{}:", name).bold(), url.cyan().underline()));
        }
    }

    if let Some(table) = render_outputs(&result.outputs) {
        lines.push(String::new());
        lines.push(table);
    }
    lines.join("\n")
}

pub fn render_destroy(stack: &str, elapsed: Duration) -> String {
    format!(
        "{} Stack {} destroyed in {}",
        "✓".green().bold(),
        stack.cyan(),
        format_duration(elapsed.as_secs_f64())
    )
}

/// Outputs as a table sorted by name, or `None` when there are none.
pub fn render_outputs(outputs: &StackOutputs) -> Option<String> {
    if outputs.is_empty() {
        return None;
    }

    let rows: Vec<OutputRow> = outputs
        .iter()
        .map(|(name, value)| OutputRow { name: name.clone(), value: display_value(value) })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    Some(table.to_string())
}

fn change_line(changes: &ChangeCounts) -> String {
    format!(
        "{} created, {} updated, {} deleted, {} unchanged",
        changes.created.to_string().green(),
        changes.updated.to_string().yellow(),
        changes.deleted.to_string().red(),
        changes.unchanged
    )
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Outputs whose value looks like a URL, in name order.
fn url_outputs(outputs: &StackOutputs) -> Vec<(&str, &str)> {
    outputs
        .iter()
        .filter_map(|(name, value)| value.as_str().map(|v| (name.as_str(), v)))
        .filter(|(_, v)| v.starts_with("https://") || v.starts_with("http://"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outputs() -> StackOutputs {
        let mut outputs = StackOutputs::new();
        outputs.insert("url".into(), json!("https://d111.cloudfront.net"));
        outputs.insert("bucket".into(), json!("site-assets-1234"));
        outputs.insert("tables".into(), json!(["sessions"]));
        outputs
    }

    #[test]
    fn test_render_preview() {
        colored::control::set_override(false);
        let diff = DiffSummary {
            changes: ChangeCounts { created: 3, updated: 1, deleted: 0, unchanged: 2 },
        };
        let text = render_preview(&diff);
        assert!(text.contains("+ 3 to create"));
        assert!(text.contains("~ 1 to update"));
        assert!(text.contains("- 0 to delete"));
        assert!(text.contains("= 2 unchanged"));

        let none = DiffSummary { changes: ChangeCounts { unchanged: 5, ..Default::default() } };
        assert_eq!(render_preview(&none), "= No changes. 5 resources up to date.");
    }

    #[test]
    fn test_render_apply() {
        colored::control::set_override(false);
        let result = DeploymentResult {
            stack: "prod".into(),
            changes: ChangeCounts { created: 4, updated: 0, deleted: 1, unchanged: 7 },
            outputs: outputs(),
            elapsed: Duration::from_secs(75),
        };
        let progress = ProgressState { files_uploaded: 12, ..Default::default() };

        let text = render_apply(&result, &progress);
        assert!(text.starts_with("✓ Stack prod deployed in 1m15s"));
        assert!(text.contains("4 created, 0 updated, 1 deleted, 7 unchanged"));
        assert!(text.contains("12 files uploaded"));
        assert!(text.contains("url: https://d111.cloudfront.net"));
    }

    #[test]
    fn test_outputs_table_sorted() {
        let table = render_outputs(&outputs()).unwrap();
        let bucket = table.find("bucket").unwrap();
        let tables = table.find("tables").unwrap();
        let url = table.find("url").unwrap();
        assert!(bucket < tables && tables < url);
        assert!(table.contains(r#"["sessions"]"#));
        assert!(table.contains("OUTPUT"));

        assert!(render_outputs(&StackOutputs::new()).is_none());
    }

    #[test]
    fn test_url_outputs() {
        let outputs = outputs();
        assert_eq!(url_outputs(&outputs), vec![("url", "https://d111.cloudfront.net")]);
    }

    #[test]
    fn test_render_destroy() {
        colored::control::set_override(false);
        assert_eq!(
            render_destroy("staging", Duration::from_millis(2500)),
            "✓ Stack staging destroyed in 2.5s"
        );
    }
}
