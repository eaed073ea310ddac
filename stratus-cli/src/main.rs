use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use stratus_core::{OperationMode, Verbosity};

mod commands;

#[derive(Parser)]
#[command(name = "stratus", version)]
#[command(about = "Deploy web-framework builds to serverless infrastructure", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Target stack (environment) name
    #[arg(short, long, global = true, env = "STRATUS_STACK")]
    pub stack: Option<String>,

    /// Print raw engine output instead of progress bars
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Verbose output plus full engine diagnostics and error detail
    #[arg(long, global = true)]
    pub debug: bool,

    /// Always build before deploying
    #[arg(long, global = true, conflicts_with = "skip_build")]
    pub build: bool,

    /// Never build, deploy the existing output
    #[arg(long, global = true)]
    pub skip_build: bool,

    /// Override the framework build command
    #[arg(long, global = true)]
    pub build_command: Option<String>,

    /// Where stack state is kept
    #[arg(long, global = true, value_parser = ["local", "remote", "auto"])]
    pub backend: Option<String>,

    /// Project directory (defaults to the current directory)
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision or update the stack (default)
    Up,

    /// Show what a deploy would change
    Preview,

    /// Tear down every resource in the stack
    Destroy {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the stack's current outputs
    Outputs {
        /// Print outputs as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clear a stale lock left by an interrupted operation
    Cancel,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let debug = cli.global.debug;

    stratus_core::init_observability(Verbosity::from_flags(cli.global.verbose, debug));

    if let Err(err) = run(cli).await {
        commands::print_error(&err, debug);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let global = &cli.global;

    match cli.command.unwrap_or(Commands::Up) {
        Commands::Up => commands::deploy::run(global, OperationMode::Apply).await,
        Commands::Preview => commands::deploy::run(global, OperationMode::Preview).await,
        Commands::Destroy { yes } => {
            if !commands::deploy::confirm_destroy(global, yes)? {
                println!("Aborted.");
                return Ok(());
            }
            commands::deploy::run(global, OperationMode::Destroy).await
        }
        Commands::Outputs { json } => commands::outputs::run(global, json).await,
        Commands::Cancel => commands::cancel::run(global).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_up() {
        let cli = Cli::try_parse_from(["stratus", "--stack", "prod"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.global.stack.as_deref(), Some("prod"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "stratus", "preview", "--stack", "dev", "--debug", "--backend", "local",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Preview)));
        assert!(cli.global.debug);
        assert_eq!(cli.global.backend.as_deref(), Some("local"));
    }

    #[test]
    fn test_build_flags_conflict() {
        assert!(Cli::try_parse_from(["stratus", "--build", "--skip-build"]).is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["stratus", "--backend", "ftp"]).is_err());
    }

    #[test]
    fn test_destroy_yes() {
        let cli = Cli::try_parse_from(["stratus", "destroy", "-y", "-s", "dev"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Destroy { yes: true })));
    }
}
