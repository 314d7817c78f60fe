//! Command-line interface for teazer.
//!
//! # Commands
//!
//! - `submit` - Plan a sweep and hand its job chains to the scheduler
//! - `status` - Report resume state of every ensemble without submitting
//! - `worker` - Run one array task on a cluster node (called by the scheduler)
//!
//! # Examples
//!
//! ```bash
//! # Inspect what would be submitted
//! teazer submit ring.toml --dryrun
//!
//! # Short test run of one subset, after job 4711 has finished
//! teazer submit ring.toml --testrun --subset "kappa=0.1" --depend 4711
//!
//! # Re-run only the averages on existing trajectories
//! teazer submit ring.toml --averageonly
//!
//! # How far did the last submission get?
//! teazer status ring.toml
//! ```
//!
//! Global flags (`--verbose`, `--quiet`, `--no-progress`) work with every
//! subcommand. Log output goes to stderr; plan listings go to stdout.

mod status;
mod submit;
mod worker;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::utils::progress::NO_PROGRESS_ENV;

/// Main CLI structure.
#[derive(Parser, Debug)]
#[command(
    name = "teazer",
    about = "Plan and submit resumable parameter sweeps to an SGE cluster",
    version,
    author,
    long_about = "teazer expands a sweep configuration into trajectory ensembles, skips seeds \
                  finished by earlier runs and submits simulate/average/postprocess job chains."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output (planning details, scheduler calls)
    #[arg(short, long, global = true, visible_alias = "debug", conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Plan a sweep and submit its jobs
    Submit(submit::SubmitCommand),

    /// Show the resume state of every ensemble
    Status(status::StatusCommand),

    /// Run one array task of an ensemble (invoked on cluster nodes)
    Worker(worker::WorkerCommand),
}

impl Cli {
    /// Log filter selected by the global flags.
    ///
    /// `--verbose` selects `debug`, `--quiet` selects `error`; otherwise
    /// `RUST_LOG` is honoured, defaulting to `info`.
    #[must_use]
    pub fn log_filter(&self) -> EnvFilter {
        if self.verbose {
            EnvFilter::new("debug")
        } else if self.quiet {
            EnvFilter::new("error")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
    }

    /// Install the global tracing subscriber. Calling it twice is harmless.
    pub fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.log_filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Execute the selected subcommand.
    ///
    /// # Errors
    ///
    /// Returns the subcommand's error; `main` renders it with
    /// [`crate::core::user_friendly_error`].
    pub async fn execute(self) -> Result<()> {
        self.init_logging();

        let progress = !self.no_progress && !self.quiet && std::env::var(NO_PROGRESS_ENV).is_err();
        match self.command {
            Commands::Submit(cmd) => cmd.execute(progress).await,
            Commands::Status(cmd) => cmd.execute().await,
            Commands::Worker(cmd) => cmd.execute().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_debug_is_an_alias_of_verbose() {
        let cli = Cli::try_parse_from(["teazer", "--debug", "status", "ring.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log_filter().to_string(), "debug");
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["teazer", "-v", "-q", "status", "ring.toml"]).is_err());

        let cli = Cli::try_parse_from(["teazer", "status", "ring.toml", "--quiet"]).unwrap();
        assert_eq!(cli.log_filter().to_string(), "error");
    }

    #[test]
    fn test_stage_selectors_are_exclusive() {
        let result = Cli::try_parse_from([
            "teazer",
            "submit",
            "ring.toml",
            "--averageonly",
            "--postprocessonly",
        ]);
        assert!(result.is_err());
    }
}
