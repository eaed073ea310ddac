//! Logging setup.
//!
//! stratus writes human progress to stdout/stderr directly; `tracing` carries
//! diagnostic logs. `RUST_LOG` always wins over the verbosity flags.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log verbosity requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only.
    #[default]
    Quiet,
    /// `--verbose`
    Verbose,
    /// `--debug`
    Debug,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            Self::Debug
        } else if verbose {
            Self::Verbose
        } else {
            Self::Quiet
        }
    }

    /// Default filter directive for this level.
    pub fn directive(&self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Verbose => "info",
            Self::Debug => "debug",
        }
    }
}

/// Build the filter: `RUST_LOG` if set and valid, otherwise the verbosity default.
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directive()))
}

/// Install the global subscriber. Logs go to stderr so they never mix with
/// command output on stdout.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init(verbosity: Verbosity) {
    let result = tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity == Verbosity::Debug)
                .with_level(true),
        )
        .try_init();

    if result.is_ok() {
        tracing::debug!("Logging initialized at {:?}", verbosity);
    }
}
