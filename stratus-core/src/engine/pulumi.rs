//! Provisioning engine backed by the `pulumi` CLI.
//!
//! Every stack operation is one CLI invocation against the program
//! directory. The backend URL and secrets passphrase travel through the
//! environment. Output is streamed two ways while the command runs:
//! - stdout/stderr lines become [`EngineMessage::Text`]
//! - the JSON-lines `--event-log` file is tailed and each line becomes an
//!   [`EngineMessage::Event`]

use super::events::{EngineEvent, EngineMessage, EventCategory};
use super::{EngineSender, ProvisioningEngine, StackHandle};
use crate::env::Passphrase;
use crate::error::{Result, StratusError};
use crate::types::{BackendDescriptor, ChangeCounts, DiffSummary, StackOutputs};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// How often the event log is polled for new lines.
const EVENT_LOG_POLL: Duration = Duration::from_millis(100);

/// [`ProvisioningEngine`] driving the `pulumi` CLI.
#[derive(Debug, Clone)]
pub struct PulumiEngine {
    /// Binary plus any leading arguments.
    command: Vec<String>,
    program_dir: PathBuf,
    passphrase: Option<Passphrase>,
    region: String,
    debug: bool,
}

impl PulumiEngine {
    /// Use the `pulumi` binary on `PATH`, or `STRATUS_PULUMI_BIN` when set.
    pub fn new(
        program_dir: impl Into<PathBuf>,
        passphrase: Option<Passphrase>,
        region: impl Into<String>,
        debug: bool,
    ) -> Self {
        let binary = std::env::var("STRATUS_PULUMI_BIN").unwrap_or_else(|_| "pulumi".to_string());
        Self {
            command: vec![binary],
            program_dir: program_dir.into(),
            passphrase,
            region: region.into(),
            debug,
        }
    }

    /// Replace the command used to invoke the engine.
    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Select `name`, creating it first when `create` is set.
    async fn open(
        &self,
        name: &str,
        backend: &BackendDescriptor,
        create: bool,
    ) -> Result<Box<dyn StackHandle>> {
        // Stack secrets are never encrypted under a built-in passphrase.
        let passphrase = self.passphrase.clone().ok_or(StratusError::MissingPassphrase)?;

        if !self.program_dir.is_dir() {
            return Err(StratusError::InvalidConfig {
                reason: format!(
                    "infrastructure program directory {} does not exist",
                    self.program_dir.display()
                ),
            });
        }

        let cli = PulumiCli {
            command: self.command.clone(),
            program_dir: self.program_dir.clone(),
            backend_url: backend.url.clone(),
            passphrase,
            region: self.region.clone(),
            debug: self.debug,
        };

        let mut args = vec!["stack", "select", name];
        if create {
            args.push("--create");
        }
        cli.run(name, "stack select", &args, None).await?;
        info!("Selected stack {}", name);

        Ok(Box::new(PulumiStack { name: name.to_string(), cli }))
    }
}

#[async_trait]
impl ProvisioningEngine for PulumiEngine {
    #[instrument(skip(self, backend), fields(backend = %backend))]
    async fn create_or_select_stack(
        &self,
        name: &str,
        backend: &BackendDescriptor,
    ) -> Result<Box<dyn StackHandle>> {
        self.open(name, backend, true).await
    }

    #[instrument(skip(self, backend), fields(backend = %backend))]
    async fn select_stack(
        &self,
        name: &str,
        backend: &BackendDescriptor,
    ) -> Result<Box<dyn StackHandle>> {
        self.open(name, backend, false).await
    }

    fn name(&self) -> &str {
        "pulumi"
    }
}

/// Everything needed to invoke the CLI against one backend.
#[derive(Debug, Clone)]
struct PulumiCli {
    command: Vec<String>,
    program_dir: PathBuf,
    backend_url: String,
    passphrase: Passphrase,
    region: String,
    debug: bool,
}

/// Captured result of one CLI invocation.
struct RunOutput {
    stdout: String,
    summary: Option<ChangeCounts>,
}

impl PulumiCli {
    /// Run one CLI command.
    ///
    /// With `stream`, output lines and event-log events are forwarded as they
    /// arrive. A failed command becomes a typed error via
    /// [`StratusError::from_engine_output`].
    async fn run(
        &self,
        stack: &str,
        operation: &str,
        args: &[&str],
        stream: Option<EngineSender>,
    ) -> Result<RunOutput> {
        let (binary, prefix) = self
            .command
            .split_first()
            .ok_or_else(|| StratusError::Internal("empty engine command".into()))?;

        let event_log = match &stream {
            Some(_) => Some(
                tempfile::Builder::new()
                    .prefix("stratus-events-")
                    .suffix(".jsonl")
                    .tempfile()
                    .map_err(StratusError::internal)?
                    .into_temp_path(),
            ),
            None => None,
        };

        let mut cmd = Command::new(binary);
        cmd.args(prefix)
            .args(args)
            .arg("--cwd")
            .arg(&self.program_dir)
            .arg("--non-interactive")
            .env("PULUMI_BACKEND_URL", &self.backend_url)
            .env("PULUMI_SKIP_UPDATE_CHECK", "true")
            .env("AWS_REGION", &self.region)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        match &self.passphrase {
            Passphrase::Value(value) => cmd.env("PULUMI_CONFIG_PASSPHRASE", value),
            Passphrase::File(path) => cmd.env("PULUMI_CONFIG_PASSPHRASE_FILE", path),
        };

        if let Some(path) = &event_log {
            cmd.arg("--event-log").arg(path.to_path_buf());
        }

        if self.debug {
            cmd.args(["--debug", "--logtostderr", "-v=9"]);
        }

        debug!(operation, ?args, "Running engine command");

        let mut child = cmd.spawn().map_err(|e| StratusError::Provisioning {
            operation: operation.to_string(),
            message: format!("failed to run {} (is the pulumi CLI installed?): {}", binary, e),
            detail: String::new(),
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StratusError::Internal("engine stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| StratusError::Internal("engine stderr not captured".into()))?;

        let (done_tx, done_rx) = watch::channel(false);

        let tail = async {
            match (&event_log, &stream) {
                (Some(path), Some(tx)) => tail_event_log(path, tx, done_rx).await,
                _ => None,
            }
        };

        let wait = async {
            let status = child.wait().await;
            let _ = done_tx.send(true);
            status
        };

        let (stdout_text, stderr_text, summary, status) = tokio::join!(
            forward_lines(stdout, stream.clone()),
            forward_lines(stderr, stream.clone()),
            tail,
            wait
        );

        let status = status.map_err(|e| StratusError::Provisioning {
            operation: operation.to_string(),
            message: format!("failed to wait for engine: {}", e),
            detail: String::new(),
        })?;

        if !status.success() {
            let mut text = stderr_text;
            text.push('\n');
            text.push_str(&stdout_text);
            return Err(StratusError::from_engine_output(stack, operation, &text));
        }

        Ok(RunOutput { stdout: stdout_text, summary })
    }
}

/// Forward each line of `reader` as a text message, returning everything read.
async fn forward_lines<R>(reader: R, stream: Option<EngineSender>) -> String
where
    R: AsyncRead + Unpin,
{
    let mut collected = String::new();
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(tx) = &stream {
                    let _ = tx.send(EngineMessage::Text(line.clone()));
                }
                collected.push_str(&line);
                collected.push('\n');
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading engine output: {}", e);
                break;
            }
        }
    }

    collected
}

/// Tail the engine's JSON-lines event log until the engine exits
/// (`tail -f` behavior), forwarding each event.
///
/// Returns the change counts from the summary event, if one was seen.
async fn tail_event_log(
    path: &Path,
    tx: &EngineSender,
    done: watch::Receiver<bool>,
) -> Option<ChangeCounts> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            warn!("Cannot open event log {}: {}", path.display(), e);
            return None;
        }
    };

    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut summary = None;
    let mut draining = false;

    loop {
        match reader.read_line(&mut line).await {
            Ok(0) => {
                if draining {
                    break;
                }
                if *done.borrow() {
                    // One more pass picks up lines written just before exit.
                    draining = true;
                    continue;
                }
                tokio::time::sleep(EVENT_LOG_POLL).await;
            }
            Ok(_) => {
                // A partial line stays buffered until its newline arrives.
                if line.ends_with('\n') {
                    forward_event(&line, tx, &mut summary);
                    line.clear();
                }
            }
            Err(e) => {
                warn!("Error reading event log: {}", e);
                break;
            }
        }
    }

    if !line.trim().is_empty() {
        forward_event(&line, tx, &mut summary);
    }

    summary
}

fn forward_event(line: &str, tx: &EngineSender, summary: &mut Option<ChangeCounts>) {
    let Some(event) = EngineEvent::parse(line.trim()) else {
        debug!("Skipping malformed event line");
        return;
    };
    if let EventCategory::Summary(Some(counts)) = event.classify() {
        *summary = Some(counts);
    }
    let _ = tx.send(EngineMessage::Event(event));
}

/// A stack selected through the CLI.
struct PulumiStack {
    name: String,
    cli: PulumiCli,
}

#[async_trait]
impl StackHandle for PulumiStack {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, value), fields(stack = %self.name))]
    async fn set_config(&self, key: &str, value: &str) -> Result<()> {
        let args = ["config", "set", key, value, "--stack", self.name.as_str()];
        self.cli.run(&self.name, "config set", &args, None).await?;
        Ok(())
    }

    #[instrument(skip(self, tx), fields(stack = %self.name))]
    async fn refresh(&self, tx: EngineSender) -> Result<()> {
        self.cli
            .run(
                &self.name,
                "refresh",
                &["refresh", "--yes", "--skip-preview", "--stack", &self.name],
                Some(tx),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, tx), fields(stack = %self.name))]
    async fn preview(&self, tx: EngineSender) -> Result<DiffSummary> {
        let output = self
            .cli
            .run(&self.name, "preview", &["preview", "--diff", "--stack", &self.name], Some(tx))
            .await?;
        Ok(DiffSummary { changes: output.summary.unwrap_or_default() })
    }

    #[instrument(skip(self, tx), fields(stack = %self.name))]
    async fn up(&self, tx: EngineSender) -> Result<ChangeCounts> {
        let args = ["up", "--yes", "--skip-preview", "--stack", self.name.as_str()];
        let output = self.cli.run(&self.name, "up", &args, Some(tx)).await?;
        Ok(output.summary.unwrap_or_default())
    }

    #[instrument(skip(self, tx), fields(stack = %self.name))]
    async fn destroy(&self, tx: EngineSender) -> Result<()> {
        self.cli
            .run(
                &self.name,
                "destroy",
                &["destroy", "--yes", "--skip-preview", "--stack", &self.name],
                Some(tx),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(stack = %self.name))]
    async fn cancel(&self) -> Result<()> {
        self.cli.run(&self.name, "cancel", &["cancel", "--yes", &self.name], None).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(stack = %self.name))]
    async fn outputs(&self) -> Result<StackOutputs> {
        let args = ["stack", "output", "--json", "--stack", self.name.as_str()];
        let output = self.cli.run(&self.name, "stack output", &args, None).await?;
        parse_outputs(&output.stdout)
    }
}

fn parse_outputs(stdout: &str) -> Result<StackOutputs> {
    if stdout.trim().is_empty() {
        return Ok(StackOutputs::new());
    }
    serde_json::from_str(stdout).map_err(|e| StratusError::Provisioning {
        operation: "stack output".into(),
        message: format!("unexpected output format: {}", e),
        detail: stdout.trim().to_string(),
    })
}
