//! Progress interpretation for engine output.
//!
//! Turns the engine's ordered stream of text and events into terminal
//! progress. Rendering starts as a single spinner (`Simple`) and switches once,
//! irreversibly, to labeled bars (`Detailed`) the first time a resource is
//! about to be created, updated or deleted. Operations that turn out to be
//! no-ops never show bars.
//!
//! This is a presentation layer: the counters here are estimates and have no
//! influence on what the engine does or on the reported result.

mod naming;

pub use naming::{friendly_name, is_file_resource};

use crate::engine::{
    channel, EngineEvent, EngineMessage, EngineReceiver, EngineSender, EventCategory,
    ResourceEvent, ResourcePhase,
};
use crate::error::{Result, StratusError};
use crate::format::format_duration;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Step count assumed when an operation starts, before anything is known.
const DEFAULT_STEP_ESTIMATE: u64 = 10;

/// Estimated totals are this multiple of what has been seen so far.
const FILE_ESTIMATE_FACTOR: u64 = 2;
const RESOURCE_ESTIMATE_FACTOR: u64 = 2;

/// Engine output lines kept for display after a failure.
const RECENT_OUTPUT_LINES: usize = 15;

/// Diagnostic fragments that indicate work in progress.
const IN_PROGRESS_HINTS: &[&str] =
    &["creating", "updating", "deleting", "uploading", "replacing", "still "];

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Current render mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// One spinner with a status label.
    #[default]
    Simple,
    /// Overall, resource and file bars.
    Detailed,
}

/// Where progress is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawTarget {
    /// The user's terminal (stderr).
    Terminal,
    /// Nowhere (tests, piped output).
    Hidden,
}

/// Mutable progress state, owned by one interpreter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub mode: RenderMode,
    /// Times the mode changed (0 or 1).
    pub mode_switches: u32,
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub files_uploaded: u64,
    pub estimated_resources: u64,
    pub estimated_files: u64,
    pub completed_ops: u64,
    pub estimated_steps: u64,
    pub status: String,
    /// Type tokens seen per phase, for the final summary.
    pub created_types: Vec<String>,
    pub updated_types: Vec<String>,
    pub deleted_types: Vec<String>,
}

impl ProgressState {
    /// Resource changes observed so far (files excluded).
    pub fn resources_changed(&self) -> u64 {
        self.created + self.updated + self.deleted
    }
}

/// Detailed-mode indicators.
struct DetailedBars {
    overall: ProgressBar,
    resources: ProgressBar,
    files: ProgressBar,
}

impl DetailedBars {
    fn all(&self) -> [&ProgressBar; 3] {
        [&self.overall, &self.resources, &self.files]
    }
}

/// Consumes engine messages and renders progress.
pub struct ProgressInterpreter {
    title: String,
    verbose: bool,
    /// Only log text; structured events are not rendered.
    passive: bool,
    target: DrawTarget,
    state: ProgressState,
    started: Instant,
    multi: MultiProgress,
    spinner: Option<ProgressBar>,
    bars: Option<DetailedBars>,
    recent_output: VecDeque<String>,
    finished: bool,
}

impl ProgressInterpreter {
    /// Start progress for an operation titled `title` ("Deploy", "Refresh", ...).
    pub fn new(title: impl Into<String>, verbose: bool, target: DrawTarget) -> Self {
        let title = title.into();
        let multi = match target {
            DrawTarget::Terminal => MultiProgress::with_draw_target(ProgressDrawTarget::stderr()),
            DrawTarget::Hidden => MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        };

        let mut interpreter = Self {
            state: ProgressState { status: format!("{}...", title), ..Default::default() },
            title,
            verbose,
            passive: false,
            target,
            started: Instant::now(),
            multi,
            spinner: None,
            bars: None,
            recent_output: VecDeque::with_capacity(RECENT_OUTPUT_LINES),
            finished: false,
        };

        if verbose {
            println!("{} {}", "→".cyan().bold(), interpreter.state.status);
        } else {
            interpreter.start_spinner();
        }

        interpreter
    }

    /// Interpreter that only logs engine text. Used for dry runs, where
    /// planned-change events must not drive the bars.
    pub fn passive(title: impl Into<String>, verbose: bool, target: DrawTarget) -> Self {
        let mut interpreter = Self::new(title, verbose, target);
        interpreter.passive = true;
        interpreter
    }

    /// Run `operation` with a fresh engine channel feeding this interpreter,
    /// then complete progress with the operation's outcome.
    ///
    /// Returns the operation's value with the final progress state.
    pub async fn track<T, F, Fut>(self, operation: F) -> Result<(T, ProgressState)>
    where
        F: FnOnce(EngineSender) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let (tx, rx) = channel();
        let handle = self.spawn(rx);

        // The operation owns the only sender, so the interpreter task ends
        // once the operation has finished.
        let result = operation(tx).await;

        let mut progress = handle.await.map_err(StratusError::internal)?;
        progress.complete(result.is_ok());
        let state = progress.state.clone();
        result.map(|value| (value, state))
    }

    /// Consume messages until every sender is dropped, then hand the
    /// interpreter back.
    pub async fn run(mut self, mut rx: EngineReceiver) -> Self {
        while let Some(message) = rx.recv().await {
            self.handle(message);
        }
        self
    }

    /// Run [`Self::run`] on its own task.
    pub fn spawn(self, rx: EngineReceiver) -> JoinHandle<Self> {
        tokio::spawn(self.run(rx))
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Most recent engine output lines.
    pub fn recent_output(&self) -> impl Iterator<Item = &str> {
        self.recent_output.iter().map(String::as_str)
    }

    /// Replace the status label.
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.state.status = status.into();
        self.refresh_labels();
    }

    /// Dispatch one engine message.
    pub fn handle(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Text(line) => self.handle_text(&line),
            EngineMessage::Event(event) => self.handle_event(&event),
        }
    }

    /// Passive path for raw engine output: printed when verbose, otherwise
    /// only logged and remembered for failure output.
    pub fn handle_text(&mut self, line: &str) {
        if self.verbose {
            println!("{}", line);
            return;
        }

        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() {
            return;
        }
        debug!(target: "stratus::engine", "{}", trimmed);
        if self.recent_output.len() == RECENT_OUTPUT_LINES {
            self.recent_output.pop_front();
        }
        self.recent_output.push_back(trimmed.to_string());
    }

    pub fn handle_event(&mut self, event: &EngineEvent) {
        if self.passive {
            return;
        }
        match event.classify() {
            EventCategory::Prelude => {
                self.state.estimated_steps = self.state.estimated_steps.max(DEFAULT_STEP_ESTIMATE);
                self.set_status(format!("{} started", self.title));
            }
            EventCategory::Summary(_) => {
                if !self.verbose {
                    self.finalize_indicators(true);
                }
            }
            EventCategory::Resource(resource) if resource.phase.is_mutation() => {
                self.record_change(&resource);
            }
            EventCategory::Resource(resource) => self.record_outputs(&resource),
            EventCategory::Diagnostic { message, severity } => {
                self.record_diagnostic(&message, &severity);
            }
            EventCategory::Other => {}
        }
    }

    /// Finish progress and print the completion or failure line.
    ///
    /// Safe to call more than once; only the first call prints.
    pub fn complete(&mut self, success: bool) {
        if self.finished {
            return;
        }
        self.finished = true;

        let elapsed = format_duration(self.elapsed().as_secs_f64());
        let line = if success {
            format!("{} {} completed in {}", "✓".green().bold(), self.title, elapsed)
        } else {
            format!("{} {} failed after {}", "✗".red().bold(), self.title, elapsed)
        };

        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(line);
        } else {
            self.finalize_indicators(success);
            self.print_line(line);
        }

        if !success {
            self.print_partial_progress();
        }
    }

    fn start_spinner(&mut self) {
        let spinner = self.multi.add(ProgressBar::new_spinner());
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(SPINNER_TICKS),
        );
        spinner.set_message(self.state.status.clone());
        if self.target == DrawTarget::Terminal {
            spinner.enable_steady_tick(Duration::from_millis(100));
        }
        self.spinner = Some(spinner);
    }

    /// Switch to detailed mode. Happens at most once per interpreter.
    fn enter_detailed(&mut self) {
        if self.state.mode == RenderMode::Detailed {
            return;
        }
        self.state.mode = RenderMode::Detailed;
        self.state.mode_switches += 1;
        self.state.estimated_steps = self.state.estimated_steps.max(DEFAULT_STEP_ESTIMATE);

        if self.verbose {
            return;
        }

        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }

        let overall = self.add_bar("Overall", self.state.estimated_steps, "{percent:>3}% {msg}");
        let resources = self.add_bar("Resources", 1, "{pos}/{len}");
        let files = self.add_bar("Files", 1, "{pos}/{len}");
        self.bars = Some(DetailedBars { overall, resources, files });
        self.refresh_labels();
    }

    fn add_bar(&self, prefix: &'static str, len: u64, suffix: &str) -> ProgressBar {
        let template = format!("{{prefix:>10.bold}} [{{bar:40.cyan/blue}}] {}", suffix);
        let bar = self.multi.add(ProgressBar::new(len));
        bar.set_style(
            ProgressStyle::with_template(&template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.set_prefix(prefix);
        bar
    }

    fn record_change(&mut self, event: &ResourceEvent) {
        self.enter_detailed();

        let state = &mut self.state;
        let types = match event.phase {
            ResourcePhase::PreCreate => &mut state.created_types,
            ResourcePhase::PreUpdate => &mut state.updated_types,
            _ => &mut state.deleted_types,
        };
        types.push(event.resource_type.clone());

        if is_file_resource(&event.resource_type) {
            state.files_uploaded += 1;
            state.estimated_files =
                state.estimated_files.max(state.files_uploaded * FILE_ESTIMATE_FACTOR);
        } else {
            match event.phase {
                ResourcePhase::PreCreate => state.created += 1,
                ResourcePhase::PreUpdate => state.updated += 1,
                _ => state.deleted += 1,
            }
            state.estimated_resources = state
                .estimated_resources
                .max(state.resources_changed() * RESOURCE_ESTIMATE_FACTOR);
        }

        let label = friendly_name(&event.resource_type);
        if self.verbose {
            let marker = match event.phase {
                ResourcePhase::PreCreate => "+".green().bold(),
                ResourcePhase::PreUpdate => "~".yellow().bold(),
                _ => "-".red().bold(),
            };
            println!("  {} {} {}", marker, label, event.name.dimmed());
        }

        self.set_status(format!("{} {} {}", phase_verb(event.phase), label, event.name));
    }

    fn record_outputs(&mut self, event: &ResourceEvent) {
        self.state.completed_ops += 1;

        if self.verbose {
            println!(
                "  {} {} {}",
                "✓".green(),
                friendly_name(&event.resource_type),
                event.name.dimmed()
            );
        }
        self.refresh_labels();
    }

    fn record_diagnostic(&mut self, message: &str, severity: &str) {
        if message.is_empty() {
            return;
        }
        if self.verbose {
            let line = match severity {
                "error" => message.red().to_string(),
                "warning" => message.yellow().to_string(),
                _ => message.dimmed().to_string(),
            };
            println!("    {}", line);
            return;
        }

        let lowered = message.to_lowercase();
        if !IN_PROGRESS_HINTS.iter().any(|hint| lowered.contains(hint)) {
            return;
        }
        if let Some(bars) = &self.bars {
            let len = bars.overall.length().unwrap_or(0);
            if bars.overall.position() + 1 < len {
                bars.overall.inc(1);
            }
        }
    }

    /// Push counters into the spinner or bars.
    fn refresh_labels(&mut self) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(self.state.status.clone());
        }

        let Some(bars) = &self.bars else { return };
        let state = &self.state;

        let overall_len = state.estimated_steps.max(state.completed_ops + 1);
        bars.overall.set_length(overall_len);
        let position = state.completed_ops.max(bars.overall.position()).min(overall_len);
        bars.overall.set_position(position);
        bars.overall.set_message(state.status.clone());

        bars.resources.set_length(state.estimated_resources.max(state.resources_changed()).max(1));
        bars.resources.set_position(state.resources_changed());

        bars.files.set_length(state.estimated_files.max(state.files_uploaded).max(1));
        bars.files.set_position(state.files_uploaded);
    }

    /// Drive bars to 100% on success; leave them where they stopped on failure.
    fn finalize_indicators(&mut self, success: bool) {
        let Some(bars) = self.bars.take() else { return };
        for bar in bars.all() {
            if success {
                let len = bar.length().unwrap_or(bar.position()).max(bar.position());
                bar.set_length(len);
                bar.set_position(len);
                bar.finish();
            } else {
                bar.abandon();
            }
        }
    }

    fn print_partial_progress(&self) {
        let state = &self.state;
        if state.resources_changed() > 0 || state.files_uploaded > 0 {
            self.print_line(format!(
                "  Partial progress: {} created, {} updated, {} deleted, {} files uploaded",
                state.created, state.updated, state.deleted, state.files_uploaded
            ));
        }

        if !self.verbose && !self.recent_output.is_empty() {
            self.print_line(format!("  {}", "Last engine output:".dimmed()));
            for line in &self.recent_output {
                self.print_line(format!("    {}", line.dimmed()));
            }
        }
    }

    fn print_line(&self, line: String) {
        if self.verbose {
            println!("{}", line);
        } else {
            let _ = self.multi.println(line);
        }
    }
}

fn phase_verb(phase: ResourcePhase) -> &'static str {
    match phase {
        ResourcePhase::PreCreate => "Creating",
        ResourcePhase::PreUpdate => "Updating",
        ResourcePhase::PreDelete => "Deleting",
        ResourcePhase::OutputsReady => "Finished",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn interpreter() -> ProgressInterpreter {
        ProgressInterpreter::new("Deploy", false, DrawTarget::Hidden)
    }

    fn pre(op: &str, ty: &str, name: &str) -> EngineMessage {
        EngineMessage::Event(EngineEvent(json!({
            "resourcePreEvent": {"metadata": {
                "op": op,
                "urn": format!("urn:pulumi:prod::site::{}::{}", ty, name),
                "type": ty
            }}
        })))
    }

    fn outputs(ty: &str, name: &str) -> EngineMessage {
        EngineMessage::Event(EngineEvent(json!({
            "resOutputsEvent": {"metadata": {
                "op": "same",
                "urn": format!("urn:pulumi:prod::site::{}::{}", ty, name),
                "type": ty
            }}
        })))
    }

    fn prelude() -> EngineMessage {
        EngineMessage::Event(EngineEvent(json!({"preludeEvent": {"config": {}}})))
    }

    fn summary() -> EngineMessage {
        EngineMessage::Event(EngineEvent(json!({"summaryEvent": {"resourceChanges": {"same": 3}}})))
    }

    #[test]
    fn test_starts_simple() {
        let progress = interpreter();
        assert_eq!(progress.state().mode, RenderMode::Simple);
        assert!(progress.spinner.is_some());
        assert!(progress.bars.is_none());
    }

    #[test]
    fn test_noop_operation_stays_simple() {
        let mut progress = interpreter();
        progress.handle(prelude());
        progress.handle(outputs("aws:s3/bucket:Bucket", "assets"));
        progress.handle(outputs("aws:lambda/function:Function", "server"));
        progress.handle(summary());
        progress.complete(true);

        let state = progress.state();
        assert_eq!(state.mode, RenderMode::Simple);
        assert_eq!(state.mode_switches, 0);
        assert_eq!(state.completed_ops, 2);
        assert!(progress.bars.is_none());
    }

    #[test]
    fn test_first_mutation_switches_once() {
        let mut progress = interpreter();
        progress.handle(prelude());
        progress.handle(pre("create", "aws:s3/bucket:Bucket", "assets"));
        assert_eq!(progress.state().mode, RenderMode::Detailed);
        assert!(progress.spinner.is_none());
        assert!(progress.bars.is_some());

        progress.handle(pre("update", "aws:lambda/function:Function", "server"));
        progress.handle(pre("delete", "aws:sqs/queue:Queue", "jobs"));

        let state = progress.state();
        assert_eq!(state.mode_switches, 1);
        assert_eq!((state.created, state.updated, state.deleted), (1, 1, 1));
        assert_eq!(state.created_types, vec!["aws:s3/bucket:Bucket"]);
        assert_eq!(state.status, "Deleting queue jobs");
    }

    #[test]
    fn test_mode_never_returns_to_simple() {
        let mut progress = interpreter();
        progress.handle(pre("create", "aws:s3/bucket:Bucket", "assets"));
        progress.handle(outputs("aws:s3/bucket:Bucket", "assets"));
        progress.handle(summary());
        progress.complete(true);
        assert_eq!(progress.state().mode, RenderMode::Detailed);
        assert_eq!(progress.state().mode_switches, 1);
    }

    #[test]
    fn test_files_counted_separately() {
        let mut progress = interpreter();
        for i in 0..3 {
            let name = format!("f{i}");
            progress.handle(pre("create", "aws:s3/bucketObjectv2:BucketObjectv2", &name));
        }
        progress.handle(pre("create", "aws:cloudfront/distribution:Distribution", "cdn"));

        let state = progress.state();
        assert_eq!(state.files_uploaded, 3);
        assert_eq!(state.estimated_files, 3 * FILE_ESTIMATE_FACTOR);
        assert_eq!(state.created, 1);
        assert_eq!(state.estimated_resources, RESOURCE_ESTIMATE_FACTOR);
        assert_eq!(state.created_types.len(), 4);
    }

    #[test]
    fn test_file_like_infrastructure_counts_as_resources() {
        let mut progress = interpreter();
        progress.handle(pre("create", "aws:iam/instanceProfile:InstanceProfile", "web"));
        progress.handle(pre(
            "create",
            "aws:s3/bucketObjectLockConfigurationV2:BucketObjectLockConfigurationV2",
            "lock",
        ));

        let state = progress.state();
        assert_eq!(state.files_uploaded, 0);
        assert_eq!(state.created, 2);
    }

    #[test]
    fn test_summary_finalizes_bars() {
        let mut progress = interpreter();
        progress.handle(pre("create", "aws:s3/bucket:Bucket", "assets"));
        let overall = progress.bars.as_ref().map(|b| b.overall.clone()).unwrap();

        progress.handle(summary());
        assert!(progress.bars.is_none());
        assert!(overall.is_finished());
        assert_eq!(overall.position(), overall.length().unwrap());
    }

    #[test]
    fn test_outputs_drive_overall() {
        let mut progress = interpreter();
        progress.handle(prelude());
        progress.handle(pre("create", "aws:s3/bucket:Bucket", "assets"));
        for i in 0..3 {
            progress.handle(outputs("aws:s3/bucket:Bucket", &format!("b{i}")));
        }
        let bars = progress.bars.as_ref().unwrap();
        assert_eq!(bars.overall.position(), 3);
        assert_eq!(bars.overall.length(), Some(DEFAULT_STEP_ESTIMATE));
    }

    #[test]
    fn test_diagnostic_bumps_overall() {
        let mut progress = interpreter();
        progress.handle(pre("create", "aws:cloudfront/distribution:Distribution", "cdn"));
        let diag = |message: &str| {
            EngineMessage::Event(EngineEvent(json!({
                "diagnosticEvent": {"message": message, "severity": "info"}
            })))
        };
        progress.handle(diag("Still creating distribution... [2m elapsed]"));
        progress.handle(diag("unrelated note"));
        assert_eq!(progress.bars.as_ref().unwrap().overall.position(), 1);
        assert_eq!(progress.state().completed_ops, 0);
    }

    #[test]
    fn test_text_is_passive() {
        let mut progress = interpreter();
        for i in 0..(RECENT_OUTPUT_LINES + 5) {
            progress.handle(EngineMessage::Text(format!("line {i}")));
        }
        progress.handle(EngineMessage::Text("   ".into()));

        assert_eq!(progress.state().mode, RenderMode::Simple);
        assert_eq!(progress.recent_output().count(), RECENT_OUTPUT_LINES);
        assert_eq!(progress.recent_output().last(), Some("line 19"));
    }

    #[test]
    fn test_verbose_mode_skips_rendering() {
        let mut progress = ProgressInterpreter::new("Deploy", true, DrawTarget::Hidden);
        assert!(progress.spinner.is_none());
        progress.handle(pre("create", "aws:s3/bucket:Bucket", "assets"));
        assert!(progress.bars.is_none());
        progress.complete(true);
    }

    #[test]
    fn test_complete_is_idempotent() {
        let mut progress = interpreter();
        progress.complete(false);
        assert!(progress.finished);
        progress.complete(true);
        assert!(progress.spinner.is_none());
    }

    #[test]
    fn test_passive_ignores_events() {
        let mut progress = ProgressInterpreter::passive("Preview", false, DrawTarget::Hidden);
        progress.handle(prelude());
        progress.handle(pre("create", "aws:s3/bucket:Bucket", "assets"));
        progress.handle(EngineMessage::Text("+ aws:s3/bucket:Bucket assets create".into()));

        assert_eq!(progress.state().mode, RenderMode::Simple);
        assert_eq!(progress.state().created, 0);
        assert_eq!(progress.recent_output().count(), 1);
    }

    #[tokio::test]
    async fn test_track_returns_state() {
        let (value, state) = interpreter()
            .track(|tx| async move {
                tx.send(pre("create", "aws:dynamodb/table:Table", "sessions")).unwrap();
                Ok(7)
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(state.created, 1);
        assert_eq!(state.mode, RenderMode::Detailed);
    }

    #[tokio::test]
    async fn test_track_propagates_failure() {
        let result: Result<((), ProgressState)> = interpreter()
            .track(|_tx| async { Err(StratusError::Internal("boom".into())) })
            .await;
        assert!(matches!(result, Err(StratusError::Internal(msg)) if msg == "boom"));
    }

    #[tokio::test]
    async fn test_run_consumes_in_order() {
        let (tx, rx) = channel();
        let handle = interpreter().spawn(rx);

        tx.send(prelude()).unwrap();
        tx.send(pre("create", "aws:s3/bucket:Bucket", "assets")).unwrap();
        tx.send(pre("update", "aws:s3/bucket:Bucket", "logs")).unwrap();
        drop(tx);

        let progress = handle.await.unwrap();
        assert_eq!(progress.state().mode, RenderMode::Detailed);
        assert_eq!(progress.state().status, "Updating storage logs");
    }
}
